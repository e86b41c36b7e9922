pub mod agents;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod ingest;
pub mod notifications;
pub mod prompts;
pub mod runner;
pub mod state;
pub mod store;
