//! Catalog discovery and listing-count aggregation for RETS servers.
//!
//! This crate owns the domain logic of the retstat workspace:
//!
//! - **Metadata resolution** ([`resolve`]) walks a server's
//!   resource -> class -> field table hierarchy once per session, finds the
//!   configured status/type fields, and resolves their lookup tables into a
//!   read-only [`Catalog`].
//!
//! - **Aggregation** ([`aggregate()`]) issues one count query per lookup
//!   code and per custom query, folding the results into a [`StatsTree`]
//!   with per-class and per-resource `@total` rollups.
//!
//! - **[`Beat`]** opens every configured [`Session`], drops the ones that
//!   fail, and runs one independent polling task per session until
//!   [`stop()`](Beat::stop) is called. Each successful cycle becomes a
//!   [`StatsEvent`] handed to a [`Publisher`].
//!
//! The transport is reached only through the [`RetsBackend`] trait;
//! [`HttpBackend`] adapts `retstat_api::RetsClient`.

pub mod aggregate;
pub mod backend;
pub mod beat;
pub mod config;
pub mod error;
pub mod model;
pub mod publish;
pub mod resolve;
pub mod session;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregate::{aggregate, code_query};
pub use backend::{HttpBackend, RetsBackend, with_login};
pub use beat::Beat;
pub use config::{ConnectionConfig, Discovery, SessionConfig, TlsVerification};
pub use error::CoreError;
pub use model::{
    Catalog, Category, Class, ClassStats, CustomQuery, LabelCounts, Lookup, Resource,
    ResourceStats, StatsTree, TOTAL_KEY,
};
pub use publish::{ChannelPublisher, Publisher, SessionStats, StatsEvent};
pub use resolve::resolve_catalog;
pub use session::Session;
