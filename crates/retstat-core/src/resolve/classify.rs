use retstat_api::MetadataKind;

use crate::backend::RetsBackend;
use crate::error::CoreError;

/// A field row that matched one of the configured candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// System name of the matched field.
    pub field: String,
    /// Lookup table attached to the field (may be empty).
    pub lookup: String,
}

/// Status and type fields found in one class's field table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFields {
    pub status: Option<FieldMatch>,
    pub types: Option<FieldMatch>,
}

/// Scan the field table of `resource:class` for the candidate status and
/// type fields.
///
/// When several rows match, the last one in table order wins.
pub async fn classify_fields<B: RetsBackend>(
    backend: &B,
    resource: &str,
    class: &str,
    status_candidates: &[String],
    type_candidates: &[String],
) -> Result<ClassFields, CoreError> {
    let id = format!("{resource}:{class}");
    let rows = backend.get_metadata(MetadataKind::Table, &id).await?;

    let mut fields = ClassFields::default();
    for row in &rows {
        let name = row.field("SystemName");
        if name.is_empty() {
            continue;
        }
        let matched = || FieldMatch {
            field: name.to_owned(),
            lookup: row.field("LookupName").to_owned(),
        };
        if status_candidates.iter().any(|c| c == name) {
            fields.status = Some(matched());
        }
        if type_candidates.iter().any(|c| c == name) {
            fields.types = Some(matched());
        }
    }
    Ok(fields)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn finds_status_and_type_fields() {
        let backend = FakeBackend::new().with_fields(
            "Property",
            "RE_1",
            &[
                ("ListPrice", ""),
                ("StatDetail", "StatDetail"),
                ("PropType", "PropertyTypes"),
            ],
        );

        let fields = classify_fields(
            &backend,
            "Property",
            "RE_1",
            &names(&["ListingStatus", "StatDetail"]),
            &names(&["PropType"]),
        )
        .await
        .unwrap();

        assert_eq!(
            fields.status,
            Some(FieldMatch {
                field: "StatDetail".into(),
                lookup: "StatDetail".into()
            })
        );
        assert_eq!(fields.types.unwrap().lookup, "PropertyTypes");
    }

    #[tokio::test]
    async fn no_candidates_matched_is_not_an_error() {
        let backend = FakeBackend::new().with_fields("Agent", "Agent", &[("AgentID", "")]);
        let fields = classify_fields(
            &backend,
            "Agent",
            "Agent",
            &names(&["Status"]),
            &names(&["Type"]),
        )
        .await
        .unwrap();
        assert_eq!(fields, ClassFields::default());
    }

    #[tokio::test]
    async fn last_matching_row_wins() {
        let backend = FakeBackend::new().with_fields(
            "Property",
            "RE_1",
            &[("Status", "StatusA"), ("ListingStatus", "StatusB")],
        );
        let fields = classify_fields(
            &backend,
            "Property",
            "RE_1",
            &names(&["Status", "ListingStatus"]),
            &[],
        )
        .await
        .unwrap();
        assert_eq!(fields.status.unwrap().field, "ListingStatus");
        assert!(fields.types.is_none());
    }
}
