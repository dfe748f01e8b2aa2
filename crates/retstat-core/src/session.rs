// ── Session ──
//
// One configured server with its catalog. The catalog is resolved once
// when the session opens and is read-only afterwards.

use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::backend::{RetsBackend, with_login};
use crate::config::Discovery;
use crate::error::CoreError;
use crate::model::{Catalog, StatsTree};
use crate::resolve::resolve_catalog;

/// A server session with a fully resolved catalog.
#[derive(Debug)]
pub struct Session<B> {
    code: String,
    backend: B,
    catalog: Catalog,
}

impl<B: RetsBackend> Session<B> {
    /// Log in, resolve the catalog, log out.
    ///
    /// Any failure leaves no session behind; errors carry the session code.
    pub async fn open(
        code: impl Into<String>,
        backend: B,
        discovery: &Discovery,
    ) -> Result<Self, CoreError> {
        let code = code.into();
        debug!(session = %code, "resolving catalog");

        let catalog = with_login(&backend, resolve_catalog(&backend, discovery))
            .await
            .map_err(|e| e.in_session(&code))?;

        info!(
            session = %code,
            resources = catalog.len(),
            "session ready"
        );
        Ok(Self {
            code,
            backend,
            catalog,
        })
    }

    /// Run one aggregation cycle inside its own login.
    pub async fn collect(&self) -> Result<StatsTree, CoreError> {
        with_login(&self.backend, aggregate(&self.backend, &self.catalog))
            .await
            .map_err(|e| e.in_session(&self.code))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
