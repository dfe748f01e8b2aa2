// ── Stats aggregation ──
//
// One count query per status code, per type code, and per custom query,
// for every class of every resource, folded into a `StatsTree` with
// per-class and per-resource rollups. Strictly sequential; the first
// failing query discards the whole cycle.

use tracing::debug;

use crate::backend::RetsBackend;
use crate::error::CoreError;
use crate::model::{Catalog, Category, Lookup, Resource, StatsTree};

/// DMQL2 filter matching one code of a lookup-backed field.
pub fn code_query(field: &str, code: &str) -> String {
    format!("({field}={code})")
}

/// Run every count query the catalog implies and build the cycle's tree.
///
/// Expects `backend` to be logged in.
pub async fn aggregate<B: RetsBackend>(
    backend: &B,
    catalog: &Catalog,
) -> Result<StatsTree, CoreError> {
    let mut tree = StatsTree::new();

    for resource in catalog.resources() {
        tree.resource_mut(&resource.name);

        for class in &resource.classes {
            tree.resource_mut(&resource.name).class_mut(&class.name);

            if let Some(field) = &resource.status_field {
                count_lookups(
                    backend,
                    &mut tree,
                    resource,
                    &class.name,
                    Category::Status,
                    field,
                    &resource.statuses,
                )
                .await?;
            }

            if let Some(field) = &resource.type_field {
                count_lookups(
                    backend,
                    &mut tree,
                    resource,
                    &class.name,
                    Category::Types,
                    field,
                    &resource.types,
                )
                .await?;
            }

            for custom in &class.custom {
                let count = backend
                    .count(&custom.resource, &custom.class, &custom.query)
                    .await?;
                debug!(
                    resource = %custom.resource,
                    class = %custom.class,
                    key = %custom.key,
                    count,
                    "custom query counted"
                );
                tree.resource_mut(&custom.resource)
                    .class_mut(&custom.class)
                    .set_custom(&custom.key, count);
            }
        }
    }

    Ok(tree)
}

async fn count_lookups<B: RetsBackend>(
    backend: &B,
    tree: &mut StatsTree,
    resource: &Resource,
    class: &str,
    category: Category,
    field: &str,
    lookups: &[Lookup],
) -> Result<(), CoreError> {
    let stats = tree.resource_mut(&resource.name);
    stats.class_mut(class).counts_mut(category);
    stats.total_mut().counts_mut(category);

    for lookup in lookups {
        let count = backend
            .count(&resource.name, class, &code_query(field, &lookup.key))
            .await?;
        debug!(
            resource = %resource.name,
            class,
            category = category.key(),
            code = %lookup.key,
            count,
            "lookup counted"
        );
        tree.resource_mut(&resource.name)
            .record(class, category, &lookup.value, count);
    }
    Ok(())
}
