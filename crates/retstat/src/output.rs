//! Output: JSON-lines event sink, catalog tables, JSON/YAML rendering.

use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use retstat_core::{CoreError, Lookup, Publisher, Resource, StatsEvent};

// ── Event sink ───────────────────────────────────────────────────────

/// Writes every event as one compact JSON line.
///
/// The writer is shared by all session tasks behind a mutex.
pub struct JsonLinesPublisher {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesPublisher {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Publisher for JsonLinesPublisher {
    fn publish(&self, event: StatsEvent) -> Result<(), CoreError> {
        let line = serde_json::to_string(&event).map_err(|e| CoreError::Publish {
            message: e.to_string(),
        })?;
        let mut out = self.out.lock().map_err(|_| CoreError::Publish {
            message: "output writer poisoned".into(),
        })?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| CoreError::Publish {
                message: e.to_string(),
            })
    }
}

// ── Catalog table ────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct CatalogRow {
    #[tabled(rename = "Server")]
    pub server: String,
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Classes")]
    pub classes: String,
    #[tabled(rename = "Status field")]
    pub status_field: String,
    #[tabled(rename = "Statuses")]
    pub statuses: String,
    #[tabled(rename = "Type field")]
    pub type_field: String,
    #[tabled(rename = "Types")]
    pub types: String,
}

impl CatalogRow {
    pub fn new(server: &str, resource: &Resource) -> Self {
        Self {
            server: server.to_owned(),
            resource: resource.name.clone(),
            classes: resource
                .classes
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            status_field: resource.status_field.clone().unwrap_or_else(|| "-".into()),
            statuses: lookup_list(&resource.statuses),
            type_field: resource.type_field.clone().unwrap_or_else(|| "-".into()),
            types: lookup_list(&resource.types),
        }
    }
}

fn lookup_list(lookups: &[Lookup]) -> String {
    if lookups.is_empty() {
        return "-".into();
    }
    lookups
        .iter()
        .map(|l| format!("{}={}", l.key, l.value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Structured renderers ─────────────────────────────────────────────

pub fn render_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

pub fn render_json_lines<T: Serialize>(items: &[T]) -> Result<String, serde_json::Error> {
    let lines = items
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

pub fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(data)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
