pub mod error;
pub mod metrics;
pub mod remote;
pub mod retry;
