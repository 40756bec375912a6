pub mod paged;

pub use paged::{FetchLimits, PagedFetcher};
