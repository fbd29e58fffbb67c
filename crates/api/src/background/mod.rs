//! Long-running background tasks spawned by the server binary.

pub mod campaign_scheduler;
pub mod log_retention;
