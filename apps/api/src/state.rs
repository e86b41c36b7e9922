use crate::pipeline::runner::Pipeline;
use crate::pipeline::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Backend and notifier shared by every session.
    pub pipeline: Pipeline,
    /// Body limit applied to the upload route.
    pub max_upload_bytes: usize,
}
