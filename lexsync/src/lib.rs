//! `LexSync` — data-sync and task-filtering engine for legal case management.

pub mod cache;
pub mod config;
pub mod engine;
pub mod filter;
pub mod model;
pub mod query;
pub mod remote;
pub mod repository;
pub mod stores;
pub mod sync;
