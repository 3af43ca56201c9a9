use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tera::{Context, Tera};
use tracing::{debug, warn};

use super::{NotificationSender, SenderError};
use crate::notifications::models::Alert;

const PAGE_TEMPLATE_NAME: &str = "status_page.html";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; }
td, th { padding: 0.4em 1em; border-bottom: 1px solid #ddd; text-align: left; }
.up { color: #1a7f37; }
.down { color: #cf222e; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<p>Last updated {{ updated_at }}</p>
<table>
<tr><th>System</th><th>Host</th><th>Status</th><th>Checked</th><th>Details</th></tr>
{% for entry in entries %}<tr>
<td>{{ entry.target }}</td>
<td>{{ entry.address }}</td>
<td class="{% if entry.up %}up{% else %}down{% endif %}">{% if entry.up %}UP{% else %}DOWN{% endif %}</td>
<td>{{ entry.checked_at }}</td>
<td>{{ entry.details }}</td>
</tr>
{% endfor %}</table>
</body>
</html>
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PageEntry {
    target: String,
    address: String,
    up: bool,
    checked_at: String,
    details: String,
}

/// Keeps the latest reported status of every target and rewrites an HTML page
/// each time a new report arrives.
///
/// Entries are mirrored to a JSON file next to the page (`<output>.json`) so a
/// later process, e.g. the next single-shot run, keeps targets it has not
/// heard about yet.
pub struct StatusPageSender {
    output_path: PathBuf,
    entries_path: PathBuf,
    title: String,
    tera: Tera,
    entries: Mutex<BTreeMap<String, PageEntry>>,
}

impl StatusPageSender {
    pub fn new(output_path: PathBuf, title: String) -> Result<Self, SenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)
            .map_err(|e| SenderError::TemplatingError(e.to_string()))?;
        let entries_path = entries_path_for(&output_path);
        let entries = load_entries(&entries_path);
        Ok(Self {
            output_path,
            entries_path,
            title,
            tera,
            entries: Mutex::new(entries),
        })
    }

    fn record(&self, alert: &Alert) -> Vec<PageEntry> {
        let details = match alert.downtime() {
            Some(downtime) => format!("{} (down for {downtime})", alert.message),
            None => alert.message.clone(),
        };
        let entry = PageEntry {
            target: alert.target.clone(),
            address: alert.address.clone(),
            up: alert.kind.is_up(),
            checked_at: format_time(alert.observed_at),
            details,
        };

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(alert.target.clone(), entry);
        entries.values().cloned().collect()
    }

    fn render(&self, entries: &[PageEntry], updated_at: DateTime<Utc>) -> Result<String, SenderError> {
        let mut context = Context::new();
        context.insert("title", &self.title);
        context.insert("updated_at", &format_time(updated_at));
        context.insert("entries", entries);
        self.tera
            .render(PAGE_TEMPLATE_NAME, &context)
            .map_err(|e| SenderError::TemplatingError(e.to_string()))
    }
}

fn entries_path_for(output_path: &Path) -> PathBuf {
    let mut path = output_path.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

fn load_entries(path: &Path) -> BTreeMap<String, PageEntry> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read status page entries, starting empty.");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str::<Vec<PageEntry>>(&contents) {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| (entry.target.clone(), entry))
            .collect(),
        Err(e) => {
            warn!(path = ?path, error = %e, "Malformed status page entries, starting empty.");
            BTreeMap::new()
        }
    }
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl NotificationSender for StatusPageSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let entries = self.record(alert);
        let html = self.render(&entries, alert.observed_at)?;
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| SenderError::SendFailed(format!("cannot encode status page entries: {e}")))?;

        let page_path = self.output_path.clone();
        let entries_path = self.entries_path.clone();
        tokio::task::spawn_blocking(move || {
            write_atomically(&entries_path, &json)?;
            write_atomically(&page_path, &html)
        })
        .await
        .map_err(|e| SenderError::SendFailed(format!("status page writer panicked: {e}")))??;

        debug!(path = ?self.output_path, targets = entries.len(), "Status page updated.");
        Ok(())
    }
}
