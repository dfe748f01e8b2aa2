// ── Aggregation output ──
//
// One polling cycle's counts for one session, as a typed tree:
// resource -> class (or the resource's `@total`) -> category -> label.
// Serializes to the nested-map document shape consumers index:
// `{resource: {class|"@total": {"status"|"types"|"custom": {label|"@total": n}}}}`.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Key used for every rollup entry in the serialized tree.
pub const TOTAL_KEY: &str = "@total";

/// The lookup-driven count categories. Custom counts are kept apart
/// because they never roll up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Status,
    Types,
}

impl Category {
    pub fn key(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Types => "types",
        }
    }
}

// ── LabelCounts ──────────────────────────────────────────────────

/// Per-label counts plus their running `@total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts {
    labels: IndexMap<String, u64>,
    total: u64,
}

impl LabelCounts {
    /// Store a fresh count for `label`, replacing any earlier value, and
    /// add it to the running total.
    pub fn set(&mut self, label: &str, count: u64) {
        self.labels.insert(label.to_owned(), count);
        self.total += count;
    }

    /// Add `count` to both the label and the running total.
    pub fn add(&mut self, label: &str, count: u64) {
        *self.labels.entry(label.to_owned()).or_default() += count;
        self.total += count;
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.labels.get(label).copied()
    }

    /// The `@total` accumulator.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn sum_of_labels(&self) -> u64 {
        self.labels.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Serialize for LabelCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.labels.len() + 1))?;
        for (label, count) in &self.labels {
            map.serialize_entry(label, count)?;
        }
        map.serialize_entry(TOTAL_KEY, &self.total)?;
        map.end()
    }
}

// ── ClassStats ───────────────────────────────────────────────────

/// Counts for one class, or for a resource's `@total` pseudo-class.
///
/// A category is `None` when the resource has no field for it, so the
/// serialized tree carries no key for it at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassStats {
    status: Option<LabelCounts>,
    types: Option<LabelCounts>,
    custom: Option<IndexMap<String, u64>>,
}

impl ClassStats {
    pub fn counts(&self, category: Category) -> Option<&LabelCounts> {
        match category {
            Category::Status => self.status.as_ref(),
            Category::Types => self.types.as_ref(),
        }
    }

    /// The category's counts, created empty on first use.
    pub fn counts_mut(&mut self, category: Category) -> &mut LabelCounts {
        let slot = match category {
            Category::Status => &mut self.status,
            Category::Types => &mut self.types,
        };
        slot.get_or_insert_with(LabelCounts::default)
    }

    pub fn status(&self) -> Option<&LabelCounts> {
        self.counts(Category::Status)
    }

    pub fn types(&self) -> Option<&LabelCounts> {
        self.counts(Category::Types)
    }

    pub fn custom(&self) -> Option<&IndexMap<String, u64>> {
        self.custom.as_ref()
    }

    /// Store a custom query count. Custom counts never touch any `@total`.
    pub fn set_custom(&mut self, key: &str, count: u64) {
        self.custom_mut().insert(key.to_owned(), count);
    }

    pub(crate) fn custom_mut(&mut self) -> &mut IndexMap<String, u64> {
        self.custom.get_or_insert_with(IndexMap::new)
    }
}

impl Serialize for ClassStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(status) = &self.status {
            map.serialize_entry(Category::Status.key(), status)?;
        }
        if let Some(types) = &self.types {
            map.serialize_entry(Category::Types.key(), types)?;
        }
        if let Some(custom) = &self.custom {
            map.serialize_entry("custom", custom)?;
        }
        map.end()
    }
}

// ── ResourceStats ────────────────────────────────────────────────

/// Counts for every class of a resource plus the cross-class rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStats {
    classes: IndexMap<String, ClassStats>,
    total: ClassStats,
}

impl ResourceStats {
    pub fn class(&self, name: &str) -> Option<&ClassStats> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> &mut ClassStats {
        self.classes.entry(name.to_owned()).or_default()
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassStats)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The `@total` pseudo-class.
    pub fn total(&self) -> &ClassStats {
        &self.total
    }

    pub(crate) fn total_mut(&mut self) -> &mut ClassStats {
        &mut self.total
    }

    /// Record one status/type count for a class and fold it into the
    /// resource rollup.
    pub fn record(&mut self, class: &str, category: Category, label: &str, count: u64) {
        self.class_mut(class).counts_mut(category).set(label, count);
        self.total.counts_mut(category).add(label, count);
    }

    /// Whether the `@total` pseudo-class equals the per-label sum over
    /// all classes, for every category present.
    pub fn rollup_is_consistent(&self) -> bool {
        [Category::Status, Category::Types].into_iter().all(|category| {
            let Some(total) = self.total.counts(category) else {
                return self
                    .classes
                    .values()
                    .all(|c| c.counts(category).is_none());
            };
            let per_class: u64 = self
                .classes
                .values()
                .filter_map(|c| c.counts(category))
                .map(LabelCounts::total)
                .sum();
            let labels_match = total.labels().all(|(label, count)| {
                let sum: u64 = self
                    .classes
                    .values()
                    .filter_map(|c| c.counts(category))
                    .filter_map(|c| c.get(label))
                    .sum();
                sum == count
            });
            per_class == total.total() && labels_match
        })
    }
}

impl Serialize for ResourceStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.classes.len() + 1))?;
        for (name, class) in &self.classes {
            map.serialize_entry(name, class)?;
        }
        map.serialize_entry(TOTAL_KEY, &self.total)?;
        map.end()
    }
}

// ── StatsTree ────────────────────────────────────────────────────

/// All counts of one session for one polling cycle, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsTree {
    resources: IndexMap<String, ResourceStats>,
}

impl StatsTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceStats> {
        self.resources.get(name)
    }

    pub fn resource_mut(&mut self, name: &str) -> &mut ResourceStats {
        self.resources.entry(name.to_owned()).or_default()
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &ResourceStats)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shorthand for `resource(r)?.class(c)`.
    pub fn class(&self, resource: &str, class: &str) -> Option<&ClassStats> {
        self.resource(resource)?.class(class)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Serialize for StatsTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.resources.serialize(serializer)
    }
}
