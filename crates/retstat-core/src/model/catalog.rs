// ── Resolved catalog ──
//
// The session-scoped view of a server's data model: resources, their
// classes, the status/type fields discovered on them, and the code
// tables behind those fields. Built once at startup, read-only afterwards.

use serde::{Deserialize, Serialize};

/// A user-declared ad-hoc count query.
///
/// `query` is passed verbatim to the server as DMQL2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQuery {
    pub resource: String,
    pub class: String,
    pub key: String,
    pub query: String,
}

impl CustomQuery {
    /// Whether this query was declared for the given resource/class pair.
    pub fn targets(&self, resource: &str, class: &str) -> bool {
        self.resource == resource && self.class == class
    }
}

/// A code/label pair from a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lookup {
    /// Raw transmitted code (e.g. `"1_0"`).
    pub key: String,
    /// Display label with `.` characters removed.
    pub value: String,
}

impl Lookup {
    pub fn new(key: impl Into<String>, long_value: &str) -> Self {
        Self {
            key: key.into(),
            value: normalize_label(long_value),
        }
    }
}

/// Strip `.` from a display label so it is usable as a document key.
pub fn normalize_label(label: &str) -> String {
    label.replace('.', "")
}

/// A subtype within a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Class {
    pub name: String,
    pub custom: Vec<CustomQuery>,
}

impl Class {
    /// Create a class and attach the custom queries declared for it.
    pub fn new(resource: &str, name: impl Into<String>, declared: &[CustomQuery]) -> Self {
        let name = name.into();
        let custom = declared
            .iter()
            .filter(|q| q.targets(resource, &name))
            .cloned()
            .collect();
        Self { name, custom }
    }
}

/// A top-level entity type. Status/type fields are resource-scoped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub name: String,
    pub classes: Vec<Class>,
    pub status_field: Option<String>,
    pub statuses: Vec<Lookup>,
    pub type_field: Option<String>,
    pub types: Vec<Lookup>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Ordered resources of one session. Resource names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    resources: Vec<Resource>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource. Returns `false` (and drops it) if the name is taken.
    pub fn push(&mut self, resource: Resource) -> bool {
        if self.get(&resource.name).is_some() {
            return false;
        }
        self.resources.push(resource);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<Resource> for Catalog {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for resource in iter {
            catalog.push(resource);
        }
        catalog
    }
}
