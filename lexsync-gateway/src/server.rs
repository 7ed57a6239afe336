//! Gateway state, router assembly, and server startup.

use std::sync::Arc;

use crate::calendar::{CalendarError, CalendarProvider};
use crate::realtime::{self, RealtimeState};
use crate::routes;

/// Shared gateway state: the realtime registry and the calendar provider.
///
/// The provider is `None` when the required credentials or calendar
/// identifier are absent; calendar routes then answer with a configuration
/// error instead of touching any upstream.
pub struct GatewayState<P> {
    /// Realtime connection registry.
    pub realtime: Arc<RealtimeState>,
    calendar: Option<P>,
}

impl<P: CalendarProvider> GatewayState<P> {
    /// Builds gateway state with an optional calendar provider.
    #[must_use]
    pub fn new(calendar: Option<P>) -> Self {
        Self {
            realtime: Arc::new(RealtimeState::new()),
            calendar,
        }
    }

    /// The calendar provider, or the configuration error all calendar
    /// routes surface when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::Config`] when credentials or the calendar
    /// identifier were not configured.
    pub fn calendar(&self) -> Result<&P, CalendarError> {
        self.calendar.as_ref().ok_or_else(|| {
            CalendarError::Config(
                "calendar credentials or calendar id not configured".to_string(),
            )
        })
    }
}

/// Assembles the gateway router: calendar REST routes plus the realtime
/// WebSocket endpoint.
pub fn router<P: CalendarProvider + 'static>(state: Arc<GatewayState<P>>) -> axum::Router {
    axum::Router::new()
        .route(
            "/calendar/events",
            axum::routing::get(routes::list_events::<P>).post(routes::create_event::<P>),
        )
        .route(
            "/calendar/events/{id}",
            axum::routing::put(routes::update_event::<P>).delete(routes::delete_event::<P>),
        )
        .route("/realtime", axum::routing::get(ws_handler::<P>))
        .with_state(state)
}

/// Starts the gateway on the given address, returning the bound address
/// and a join handle.
///
/// This is the entry point used by both `main.rs` and test code (bind to
/// `127.0.0.1:0` for an OS-assigned port).
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server<P: CalendarProvider + 'static>(
    addr: &str,
    state: Arc<GatewayState<P>>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "gateway server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Upgrades an HTTP request to a realtime WebSocket connection.
async fn ws_handler<P: CalendarProvider + 'static>(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<GatewayState<P>>>,
) -> impl axum::response::IntoResponse {
    let realtime = Arc::clone(&state.realtime);
    ws.on_upgrade(move |socket| realtime::handle_socket(socket, realtime))
}
