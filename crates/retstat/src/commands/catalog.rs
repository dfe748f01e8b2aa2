//! `retstat catalog`: resolve metadata and show what was discovered.

use std::sync::Arc;

use serde::Serialize;

use retstat_core::{Beat, Catalog, ChannelPublisher};

use crate::cli::{CatalogArgs, CatalogFormat};
use crate::commands::Settings;
use crate::error::CliError;
use crate::output::{CatalogRow, print_output, render_json, render_table, render_yaml};

#[derive(Serialize)]
struct SessionCatalog<'a> {
    code: &'a str,
    resources: &'a Catalog,
}

pub async fn handle(args: &CatalogArgs, mut settings: Settings, quiet: bool) -> Result<(), CliError> {
    if let Some(ref code) = args.server {
        let available = settings
            .sessions
            .iter()
            .map(|s| s.code.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        settings.sessions.retain(|s| &s.code == code);
        if settings.sessions.is_empty() {
            return Err(CliError::UnknownServer {
                code: code.clone(),
                available,
            });
        }
    }

    let (publisher, _rx) = ChannelPublisher::new();
    let beat = Beat::new(&settings.sessions, settings.period, Arc::new(publisher)).await?;

    let catalogs: Vec<_> = beat
        .sessions()
        .iter()
        .map(|s| SessionCatalog {
            code: s.code(),
            resources: s.catalog(),
        })
        .collect();

    let rendered = match args.format {
        CatalogFormat::Table => {
            let rows: Vec<_> = catalogs
                .iter()
                .flat_map(|c| {
                    c.resources
                        .resources()
                        .iter()
                        .map(move |r| CatalogRow::new(c.code, r))
                })
                .collect();
            render_table(&rows)
        }
        CatalogFormat::Json => render_json(&catalogs)?,
        CatalogFormat::Yaml => render_yaml(&catalogs)?,
    };
    print_output(&rendered, quiet);
    Ok(())
}
