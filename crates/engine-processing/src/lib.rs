pub mod client;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod migrate;
pub mod reconcile;
pub mod retry;
