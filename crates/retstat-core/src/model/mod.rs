// ── Domain model ──
//
// The resolved catalog a session works against, and the count tree each
// polling cycle produces from it.

pub mod catalog;
pub mod stats;

pub use catalog::{Catalog, Class, CustomQuery, Lookup, Resource, normalize_label};
pub use stats::{Category, ClassStats, LabelCounts, ResourceStats, StatsTree, TOTAL_KEY};
