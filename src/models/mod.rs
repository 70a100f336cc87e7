//! Models module
//!
//! Defines the normalized data structures every source is mapped into:
//! queries, filter descriptors, records and pages.

pub mod enums;
pub mod filter;
pub mod query;
pub mod record;

pub use enums::*;
pub use filter::{FilterField, FilterOption, RangeBounds};
pub use query::{FilterSelection, NormalizedQuery, Query, Selections, SortSpec};
pub use record::{Page, Record, ResourceType, SourceRef};
