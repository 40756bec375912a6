pub mod derived;
pub mod report;

pub use derived::DerivedMigrator;
pub use report::{MigrationReport, MoveLabel};
