// In-memory `RetsBackend` for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use retstat_api::{MetadataKind, MetadataRow};

use crate::backend::RetsBackend;
use crate::error::CoreError;

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    metadata: HashMap<(MetadataKind, String), Vec<MetadataRow>>,
    counts: HashMap<(String, String, String), u64>,
    failing_metadata: HashSet<String>,
    failing_counts: HashSet<(String, String, String)>,
    fail_login: bool,
    slow_counts: Option<(usize, Duration)>,
    counts_run: AtomicUsize,
    calls: Mutex<Vec<String>>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(mut self, kind: MetadataKind, id: &str, rows: Vec<MetadataRow>) -> Self {
        self.metadata
            .entry((kind, id.to_owned()))
            .or_default()
            .extend(rows);
        self
    }

    pub fn with_resources(self, names: &[&str]) -> Self {
        let rows = names
            .iter()
            .map(|n| MetadataRow::from_pairs([("ResourceID", *n)]))
            .collect();
        self.rows(MetadataKind::Resource, "*", rows)
    }

    pub fn with_classes(self, resource: &str, names: &[&str]) -> Self {
        let rows = names
            .iter()
            .map(|n| MetadataRow::from_pairs([("ClassName", *n)]))
            .collect();
        self.rows(MetadataKind::Class, resource, rows)
    }

    /// Field table rows as `(SystemName, LookupName)`.
    pub fn with_fields(self, resource: &str, class: &str, fields: &[(&str, &str)]) -> Self {
        let rows = fields
            .iter()
            .map(|(name, lookup)| {
                MetadataRow::from_pairs([("SystemName", *name), ("LookupName", *lookup)])
            })
            .collect();
        self.rows(MetadataKind::Table, &format!("{resource}:{class}"), rows)
    }

    /// Lookup rows as `(Value, LongValue)`.
    pub fn with_lookup(self, resource: &str, lookup: &str, values: &[(&str, &str)]) -> Self {
        let rows = values
            .iter()
            .map(|(value, long)| MetadataRow::from_pairs([("Value", *value), ("LongValue", *long)]))
            .collect();
        self.rows(MetadataKind::LookupType, &format!("{resource}:{lookup}"), rows)
    }

    pub fn with_count(mut self, resource: &str, class: &str, query: &str, count: u64) -> Self {
        self.counts
            .insert((resource.into(), class.into(), query.into()), count);
        self
    }

    pub fn fail_metadata(mut self, id: &str) -> Self {
        self.failing_metadata.insert(id.to_owned());
        self
    }

    pub fn fail_count(mut self, resource: &str, class: &str, query: &str) -> Self {
        self.failing_counts
            .insert((resource.into(), class.into(), query.into()));
        self
    }

    pub fn fail_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    /// Make the first `n` count queries take `delay` each (virtual time
    /// under `start_paused`). Later queries answer immediately.
    pub fn with_slow_counts(mut self, n: usize, delay: Duration) -> Self {
        self.slow_counts = Some((n, delay));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn server_error(message: &str) -> CoreError {
        CoreError::Api {
            message: message.to_owned(),
            reply_code: Some(20203),
            status: None,
        }
    }
}

impl RetsBackend for FakeBackend {
    async fn login(&self) -> Result<(), CoreError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            return Err(CoreError::AuthenticationFailed {
                message: "bad password".into(),
            });
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), CoreError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_metadata(
        &self,
        kind: MetadataKind,
        id: &str,
    ) -> Result<Vec<MetadataRow>, CoreError> {
        self.record(format!("metadata {kind} {id}"));
        if self.failing_metadata.contains(id) {
            return Err(Self::server_error("metadata unavailable"));
        }
        Ok(self
            .metadata
            .get(&(kind, id.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn count(&self, resource: &str, class: &str, query: &str) -> Result<u64, CoreError> {
        self.record(format!("count {resource} {class} {query}"));
        let nth = self.counts_run.fetch_add(1, Ordering::SeqCst);
        if let Some((n, delay)) = self.slow_counts {
            if nth < n {
                tokio::time::sleep(delay).await;
            }
        }
        let key = (resource.to_owned(), class.to_owned(), query.to_owned());
        if self.failing_counts.contains(&key) {
            return Err(Self::server_error("search failed"));
        }
        Ok(self.counts.get(&key).copied().unwrap_or_default())
    }
}

/// A server with a `Property` resource (classes `Residential`, `Land`,
/// status field `ListingStatus` with codes A/S) and an `Agent` resource
/// without any status or type field.
pub(crate) fn property_server() -> FakeBackend {
    FakeBackend::new()
        .with_resources(&["Property", "Agent"])
        .with_classes("Property", &["Residential", "Land"])
        .with_fields(
            "Property",
            "Residential",
            &[("ListPrice", ""), ("ListingStatus", "ListingStatus")],
        )
        .with_fields(
            "Property",
            "Land",
            &[("ListPrice", ""), ("ListingStatus", "ListingStatus")],
        )
        .with_lookup("Property", "ListingStatus", &[("A", "Active"), ("S", "Sold")])
        .with_classes("Agent", &["Agent"])
        .with_fields("Agent", "Agent", &[("AgentID", "")])
        .with_count("Property", "Residential", "(ListingStatus=A)", 10)
        .with_count("Property", "Residential", "(ListingStatus=S)", 3)
        .with_count("Property", "Land", "(ListingStatus=A)", 2)
        .with_count("Property", "Land", "(ListingStatus=S)", 0)
        .with_count("Property", "Residential", "(ListPrice=1000000+)", 5)
}
