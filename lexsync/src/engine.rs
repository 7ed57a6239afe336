//! The engine's application context.
//!
//! [`SyncEngine`] wires the stores, repository, and realtime bridge into
//! one explicitly-owned object with an `initialize`/`shutdown` lifecycle.
//! Nothing here is process-global: embedders construct an engine, pass it
//! where it is needed, and tear it down when done.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use lexsync_proto::directory::{CaseId, CaseRecord, Client, NoteRecord};
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::TaskState;

use crate::config::EngineConfig;
use crate::filter::{self, FilterState, TaskView};
use crate::model::TaskJoined;
use crate::query::QueryError;
use crate::remote::{RemoteDataClient, RemoteError};
use crate::repository::Repository;
use crate::stores::{
    CASES_QUERY, CLIENTS_QUERY, DataStores, EMPLOYEES_QUERY, STATES_QUERY, TASKS_QUERY,
    notes_query,
};
use crate::sync::stream::ChangeStream;
use crate::sync::{RealtimeBridge, StreamError, SyncNotice};

fn into_query_error(error: RemoteError) -> QueryError {
    QueryError::Fetch(error.to_string())
}

/// The data-sync engine: caches, repository, and realtime bridge.
pub struct SyncEngine<B, S> {
    stores: DataStores,
    repo: Arc<Repository<B>>,
    bridge: RealtimeBridge<B, S>,
}

impl<B, S> SyncEngine<B, S>
where
    B: RemoteDataClient + Send + Sync + 'static,
    S: ChangeStream,
{
    /// Builds the engine and subscribes the bridge to every watched table.
    ///
    /// Returns the engine and the receiver of transient sync notices.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] when a realtime channel cannot be opened.
    pub async fn initialize(
        config: EngineConfig,
        backend: Arc<B>,
        stream: S,
    ) -> Result<(Self, mpsc::Receiver<SyncNotice>), StreamError> {
        let stores = DataStores::new(&config);
        let repo = Arc::new(Repository::new(backend));
        let (bridge, notices) = RealtimeBridge::new(
            stream,
            stores.clone(),
            Arc::clone(&repo),
            config.debounce,
            config.notice_buffer,
        );
        bridge.subscribe_all().await?;
        tracing::info!("sync engine initialized");
        Ok((
            Self {
                stores,
                repo,
                bridge,
            },
            notices,
        ))
    }

    /// The typed query caches.
    #[must_use]
    pub const fn stores(&self) -> &DataStores {
        &self.stores
    }

    /// The realtime bridge (channel states, explicit resubscription).
    #[must_use]
    pub const fn bridge(&self) -> &RealtimeBridge<B, S> {
        &self.bridge
    }

    /// The joined task collection, served per the staleness policy.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn tasks(&self) -> Result<Arc<Vec<TaskJoined>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .tasks
            .fetch(TASKS_QUERY, move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_tasks().await.map_err(into_query_error) }
            })
            .await
    }

    /// The employee roster.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn employees(&self) -> Result<Arc<Vec<Employee>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .employees
            .fetch(EMPLOYEES_QUERY, move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_employees().await.map_err(into_query_error) }
            })
            .await
    }

    /// The task state catalog.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn states(&self) -> Result<Arc<Vec<TaskState>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .states
            .fetch(STATES_QUERY, move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_states().await.map_err(into_query_error) }
            })
            .await
    }

    /// The client directory.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn clients(&self) -> Result<Arc<Vec<Client>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .clients
            .fetch(CLIENTS_QUERY, move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_clients().await.map_err(into_query_error) }
            })
            .await
    }

    /// Every legal case.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn cases(&self) -> Result<Arc<Vec<CaseRecord>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .cases
            .fetch(CASES_QUERY, move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_cases().await.map_err(into_query_error) }
            })
            .await
    }

    /// The notes of one case.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the underlying fetch fails after retry.
    pub async fn notes(&self, case: CaseId) -> Result<Arc<Vec<NoteRecord>>, QueryError> {
        let repo = Arc::clone(&self.repo);
        self.stores
            .notes
            .fetch(notes_query(case), move || {
                let repo = Arc::clone(&repo);
                async move { repo.load_notes(case).await.map_err(into_query_error) }
            })
            .await
    }

    /// Primes the task, employee, and state queries.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueryError`] encountered.
    pub async fn refresh_all(&self) -> Result<(), QueryError> {
        let (_tasks, _employees, _states) =
            tokio::try_join!(self.tasks(), self.employees(), self.states())?;
        Ok(())
    }

    /// Runs the filtering engine over the current task snapshot.
    ///
    /// Purely local: no fetch happens here. An unfetched snapshot yields
    /// an empty result.
    #[must_use]
    pub fn filtered_tasks(
        &self,
        view: TaskView,
        filter: &FilterState,
        viewer: Option<EmployeeId>,
        today: NaiveDate,
    ) -> Vec<TaskJoined> {
        self.stores
            .tasks
            .get(TASKS_QUERY)
            .map(|snapshot| {
                filter::filter_tasks(&snapshot, view, filter, viewer, today)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tears down every realtime channel.
    pub fn shutdown(&self) {
        self.bridge.shutdown();
        tracing::info!("sync engine shut down");
    }
}
