// retstat-api: async Rust client for RETS listing servers

pub mod auth;
pub mod client;
pub mod compact;
pub mod error;
pub mod transport;

pub use auth::{Capabilities, Credentials};
pub use client::{DEFAULT_RETS_VERSION, MetadataKind, RetsClient};
pub use compact::MetadataRow;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
