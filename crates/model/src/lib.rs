pub mod core;
pub mod files;
pub mod pagination;
pub mod tasks;
pub mod transformation;
