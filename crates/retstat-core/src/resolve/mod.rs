// ── Metadata resolution ──
//
// Walks resource -> class -> field table to find the status/type fields
// of every resource, then resolves the code tables behind them. Any
// failure aborts the whole walk: a session never runs on a partial catalog.

pub mod classify;
pub mod lookup;

use tracing::{debug, warn};

use retstat_api::MetadataKind;

use crate::backend::RetsBackend;
use crate::config::Discovery;
use crate::error::CoreError;
use crate::model::{Catalog, Class, Resource};

pub use classify::{ClassFields, FieldMatch, classify_fields};
pub use lookup::resolve_lookup;

/// Resolve the full catalog of one server.
///
/// Expects `backend` to be logged in.
pub async fn resolve_catalog<B: RetsBackend>(
    backend: &B,
    discovery: &Discovery,
) -> Result<Catalog, CoreError> {
    let rows = backend.get_metadata(MetadataKind::Resource, "*").await?;

    let mut catalog = Catalog::new();
    for row in &rows {
        let name = row.field("ResourceID");
        if name.is_empty() {
            warn!("skipping resource row without ResourceID");
            continue;
        }
        if catalog.get(name).is_some() {
            warn!(resource = name, "duplicate resource in metadata, keeping the first");
            continue;
        }

        let resource = resolve_resource(backend, name, discovery).await?;
        debug!(
            resource = %resource.name,
            classes = resource.classes.len(),
            status_field = resource.status_field.as_deref().unwrap_or("-"),
            statuses = resource.statuses.len(),
            type_field = resource.type_field.as_deref().unwrap_or("-"),
            types = resource.types.len(),
            "resource configured"
        );
        catalog.push(resource);
    }

    for query in &discovery.custom {
        let known = catalog
            .get(&query.resource)
            .is_some_and(|r| r.classes.iter().any(|c| c.name == query.class));
        if !known {
            warn!(
                key = %query.key,
                resource = %query.resource,
                class = %query.class,
                "custom query targets a class the server does not expose; it will never run"
            );
        }
    }

    Ok(catalog)
}

/// Resolve one resource: its classes, status/type fields, and lookups.
///
/// Fields are resource-scoped. If classes disagree on which field is the
/// status (or type) field, the last class that matched wins.
async fn resolve_resource<B: RetsBackend>(
    backend: &B,
    name: &str,
    discovery: &Discovery,
) -> Result<Resource, CoreError> {
    let mut resource = Resource::new(name);
    let mut status_lookup = String::new();
    let mut type_lookup = String::new();

    let rows = backend.get_metadata(MetadataKind::Class, name).await?;
    for row in &rows {
        let class_name = row.field("ClassName");
        if class_name.is_empty() {
            warn!(resource = name, "skipping class row without ClassName");
            continue;
        }
        if resource.classes.iter().any(|c| c.name == class_name) {
            warn!(
                resource = name,
                class = class_name,
                "duplicate class in metadata, keeping the first"
            );
            continue;
        }
        let class = Class::new(name, class_name, &discovery.custom);

        let fields = classify_fields(
            backend,
            name,
            &class.name,
            &discovery.status_fields,
            &discovery.type_fields,
        )
        .await?;

        if let Some(found) = fields.status {
            if resource
                .status_field
                .as_ref()
                .is_some_and(|f| *f != found.field)
            {
                warn!(resource = name, class = %class.name, field = %found.field, "classes disagree on the status field");
            }
            resource.status_field = Some(found.field);
            status_lookup = found.lookup;
        }
        if let Some(found) = fields.types {
            if resource
                .type_field
                .as_ref()
                .is_some_and(|f| *f != found.field)
            {
                warn!(resource = name, class = %class.name, field = %found.field, "classes disagree on the type field");
            }
            resource.type_field = Some(found.field);
            type_lookup = found.lookup;
        }

        resource.classes.push(class);
    }

    if resource.status_field.is_some() {
        resource.statuses = resolve_lookup(backend, name, &status_lookup).await?;
    }
    if resource.type_field.is_some() {
        resource.types = resolve_lookup(backend, name, &type_lookup).await?;
    }

    Ok(resource)
}
