use std::collections::HashSet;

use tracing::{trace, warn};

use retstat_api::MetadataKind;

use crate::backend::RetsBackend;
use crate::error::CoreError;
use crate::model::Lookup;

/// Resolve the code -> label table behind a lookup-backed field.
///
/// An empty `lookup_name` means the field has no code table; that yields
/// no lookups rather than an error. Rows keep the server's order; a
/// repeated code keeps its first row.
pub async fn resolve_lookup<B: RetsBackend>(
    backend: &B,
    resource: &str,
    lookup_name: &str,
) -> Result<Vec<Lookup>, CoreError> {
    if lookup_name.is_empty() {
        return Ok(Vec::new());
    }

    let id = format!("{resource}:{lookup_name}");
    let rows = backend.get_metadata(MetadataKind::LookupType, &id).await?;
    trace!(lookup = %id, values = rows.len(), "lookup resolved");

    let mut seen = HashSet::new();
    let mut lookups = Vec::with_capacity(rows.len());
    for row in &rows {
        let key = row.field("Value");
        if !seen.insert(key) {
            warn!(
                lookup = %id,
                key,
                "duplicate lookup code in metadata, keeping the first"
            );
            continue;
        }
        lookups.push(Lookup::new(key, row.field("LongValue")));
    }
    Ok(lookups)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn lookups_keep_server_order_and_strip_dots() {
        let backend = FakeBackend::new().with_lookup(
            "Property",
            "StatDetail",
            &[("1_1", "Pending"), ("1_0", "Active."), ("2_0", "Sold w/ Cond.")],
        );

        let lookups = resolve_lookup(&backend, "Property", "StatDetail")
            .await
            .unwrap();

        let pairs: Vec<_> = lookups
            .iter()
            .map(|l| (l.key.as_str(), l.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("1_1", "Pending"), ("1_0", "Active"), ("2_0", "Sold w/ Cond")]
        );
    }

    #[tokio::test]
    async fn repeated_codes_keep_the_first_row() {
        let backend = FakeBackend::new().with_lookup(
            "Property",
            "Status",
            &[("A", "Active"), ("S", "Sold"), ("A", "Active Again")],
        );

        let lookups = resolve_lookup(&backend, "Property", "Status").await.unwrap();
        assert_eq!(
            lookups,
            vec![Lookup::new("A", "Active"), Lookup::new("S", "Sold")]
        );
    }

    #[tokio::test]
    async fn empty_lookup_name_issues_no_query() {
        let backend = FakeBackend::new();
        let lookups = resolve_lookup(&backend, "Property", "").await.unwrap();
        assert!(lookups.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_is_surfaced() {
        let backend = FakeBackend::new().fail_metadata("Property:StatDetail");
        let result = resolve_lookup(&backend, "Property", "StatDetail").await;
        assert!(matches!(result, Err(CoreError::Api { .. })));
    }
}
