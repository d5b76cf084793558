use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use toml::map::Map;
use toml::Value;

use crate::export::DEFAULT_EXPORT_NAME;
use crate::form_state::{FieldChoices, FormField};
use crate::history_store::HistoryStore;

pub const DEFAULT_GENERATE_URL: &str = "http://127.0.0.1:11435/api/generate";
const DEFAULT_SERVER_PORT: i64 = 3000;
const DEFAULT_INPUT_DEBOUNCE_MS: i64 = 150;

const DEFAULT_CONFIG: &str = r#"
[app]
generate_url = "http://127.0.0.1:11435/api/generate"
model = ""
server_port = 3000
history_max_entries = 200
input_debounce_ms = 150
export_default_name = "crafted_prompt"

[[fields]]
key = "output_format"
choices = ["Plain text", "Markdown", "Bullet list", "Numbered steps", "JSON", "Table"]
"#;

#[derive(Debug)]
pub struct ConfigStore {
    pub path: PathBuf,
    doc: Value,
}

impl ConfigStore {
    /// Loads the config file, creating it with defaults when missing. The
    /// normalized document is written back.
    pub fn new(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config dir: {}", parent.display())
                })?;
            }
            fs::write(&path, DEFAULT_CONFIG.trim_start())
                .with_context(|| format!("failed to write default config: {}", path.display()))?;
            tracing::info!("wrote default config to {}", path.display());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let doc: Value = toml::from_str(&text)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        let mut store = Self { path, doc };
        store.normalize_doc();
        store.save()?;
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let text = toml::to_string_pretty(&self.doc).context("failed to serialize TOML")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write config: {}", self.path.display()))
    }

    pub fn generate_url(&self) -> String {
        self.app_str("generate_url")
            .unwrap_or_else(|| DEFAULT_GENERATE_URL.to_string())
    }

    pub fn model(&self) -> Option<String> {
        self.app_str("model")
    }

    pub fn server_port(&self) -> u16 {
        self.app_table()
            .and_then(|t| t.get("server_port"))
            .and_then(value_to_i64)
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SERVER_PORT as u16)
    }

    pub fn history_max_entries(&self) -> usize {
        self.app_table()
            .and_then(|t| t.get("history_max_entries"))
            .and_then(value_to_i64)
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(HistoryStore::DEFAULT_MAX_ENTRIES)
    }

    pub fn input_debounce(&self) -> Duration {
        let millis = self
            .app_table()
            .and_then(|t| t.get("input_debounce_ms"))
            .and_then(value_to_i64)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_INPUT_DEBOUNCE_MS as u64);
        Duration::from_millis(millis)
    }

    pub fn export_default_name(&self) -> String {
        self.app_str("export_default_name")
            .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string())
    }

    /// Choice lists of constrained fields. Unknown field keys and entries
    /// without any usable choice are ignored, leaving those fields free text.
    pub fn field_choices(&self) -> FieldChoices {
        let mut choices = FieldChoices::new();
        let Some(fields) = self
            .doc
            .as_table()
            .and_then(|root| root.get("fields"))
            .and_then(Value::as_array)
        else {
            return choices;
        };

        for field_value in fields {
            let Some(table) = field_value.as_table() else {
                continue;
            };
            let Some(field) = table
                .get("key")
                .and_then(Value::as_str)
                .and_then(FormField::from_key)
            else {
                continue;
            };
            let normalized = normalize_choices_from_value(table.get("choices"));
            if normalized.is_empty() {
                tracing::debug!("no choices configured for {}; keeping free text", field.key());
                continue;
            }
            choices.insert(field, normalized);
        }
        choices
    }

    fn app_str(&self, key: &str) -> Option<String> {
        self.app_table()
            .and_then(|t| t.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    }

    fn normalize_doc(&mut self) {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }

        {
            let app = self.ensure_app_table_mut();

            if app.get("generate_url").and_then(Value::as_str).is_none() {
                app.insert(
                    "generate_url".to_string(),
                    Value::String(DEFAULT_GENERATE_URL.to_string()),
                );
            }

            if app.get("model").and_then(Value::as_str).is_none() {
                app.insert("model".to_string(), Value::String(String::new()));
            }

            let port = app
                .get("server_port")
                .and_then(value_to_i64)
                .filter(|v| (1..=65_535).contains(v))
                .unwrap_or(DEFAULT_SERVER_PORT);
            app.insert("server_port".to_string(), Value::Integer(port));

            let max_entries = app
                .get("history_max_entries")
                .and_then(value_to_i64)
                .filter(|v| *v > 0)
                .unwrap_or(HistoryStore::DEFAULT_MAX_ENTRIES as i64);
            app.insert(
                "history_max_entries".to_string(),
                Value::Integer(max_entries),
            );

            let debounce = app
                .get("input_debounce_ms")
                .and_then(value_to_i64)
                .filter(|v| *v >= 0)
                .unwrap_or(DEFAULT_INPUT_DEBOUNCE_MS);
            app.insert("input_debounce_ms".to_string(), Value::Integer(debounce));

            if app
                .get("export_default_name")
                .and_then(Value::as_str)
                .is_none()
            {
                app.insert(
                    "export_default_name".to_string(),
                    Value::String(DEFAULT_EXPORT_NAME.to_string()),
                );
            }
        }

        let root = self.root_table_mut();
        let fields = root
            .entry("fields".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !fields.is_array() {
            *fields = Value::Array(Vec::new());
        }
        if let Some(items) = fields.as_array_mut() {
            items.retain(Value::is_table);
            for item in items.iter_mut().filter_map(Value::as_table_mut) {
                let choices = normalize_choices_from_value(item.get("choices"));
                item.insert("choices".to_string(), choices_to_value(&choices));
            }
        }
    }

    fn app_table(&self) -> Option<&Map<String, Value>> {
        self.doc
            .as_table()
            .and_then(|root| root.get("app"))
            .and_then(Value::as_table)
    }

    fn root_table_mut(&mut self) -> &mut Map<String, Value> {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }
        match &mut self.doc {
            Value::Table(table) => table,
            _ => unreachable!("root replaced with a table above"),
        }
    }

    fn ensure_app_table_mut(&mut self) -> &mut Map<String, Value> {
        let root = self.root_table_mut();
        let app = root
            .entry("app".to_string())
            .or_insert_with(|| Value::Table(Map::new()));
        if !app.is_table() {
            *app = Value::Table(Map::new());
        }
        match app {
            Value::Table(table) => table,
            _ => unreachable!("app replaced with a table above"),
        }
    }
}

fn normalize_choices_from_value(value: Option<&Value>) -> Vec<String> {
    let mut normalized = Vec::new();
    if let Some(Value::Array(items)) = value {
        for item in items {
            let text = value_to_text(item).trim().to_string();
            if !text.is_empty() && !normalized.iter().any(|existing| existing == &text) {
                normalized.push(text);
            }
        }
    }
    normalized
}

fn choices_to_value(choices: &[String]) -> Value {
    Value::Array(choices.iter().cloned().map(Value::String).collect())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Datetime(v) => v.to_string(),
        Value::Array(_) | Value::Table(_) => String::new(),
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .as_integer()
        .or_else(|| value.as_float().map(|v| v as i64))
        .or_else(|| value.as_str().and_then(|v| v.trim().parse::<i64>().ok()))
}

#[cfg(test)]
mod tests {
    use super::{ConfigStore, DEFAULT_GENERATE_URL};
    use crate::form_state::FormField;
    use crate::local_storage::tests::fixture_dir;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let base = fixture_dir("config_default");
        let path = base.join("config.toml");

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert!(path.exists());
        assert_eq!(store.generate_url(), DEFAULT_GENERATE_URL);
        assert_eq!(store.model(), None);
        assert_eq!(store.server_port(), 3000);
        assert_eq!(store.history_max_entries(), 200);
        assert_eq!(store.input_debounce(), Duration::from_millis(150));
        assert_eq!(store.export_default_name(), "crafted_prompt");

        let choices = store.field_choices();
        let formats = choices
            .for_field(FormField::OutputFormat)
            .expect("output format choices");
        assert!(formats.iter().any(|c| c == "Markdown"));
        assert!(choices.for_field(FormField::Title).is_none());

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn normalizes_invalid_values_and_persists_them() {
        let base = fixture_dir("config_normalize");
        let path = base.join("config.toml");
        fs::write(
            &path,
            r#"
[app]
server_port = 700000
history_max_entries = -4
input_debounce_ms = "40"
model = "llama3.2:3b"

[[fields]]
key = "output_format"
choices = ["JSON", "", "JSON", 12]

[[fields]]
key = "unknown_field"
choices = ["x"]
"#,
        )
        .expect("fixture write");

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert_eq!(store.server_port(), 3000);
        assert_eq!(store.history_max_entries(), 200);
        assert_eq!(store.input_debounce(), Duration::from_millis(40));
        assert_eq!(store.model().as_deref(), Some("llama3.2:3b"));
        assert_eq!(
            store.field_choices().for_field(FormField::OutputFormat),
            Some(&["JSON".to_string(), "12".to_string()][..])
        );

        let saved = fs::read_to_string(&path).expect("read saved");
        assert!(saved.contains("history_max_entries = 200"));
        assert!(saved.contains("generate_url"));

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn empty_choice_list_leaves_field_free_text() {
        let base = fixture_dir("config_empty_choices");
        let path = base.join("config.toml");
        fs::write(
            &path,
            r#"
[[fields]]
key = "title"
choices = []

[[fields]]
key = "target_audience"
choices = ["", "  "]
"#,
        )
        .expect("fixture write");

        let choices = ConfigStore::new(path).expect("load store").field_choices();
        assert!(choices.for_field(FormField::Title).is_none());
        assert!(choices.for_field(FormField::TargetAudience).is_none());
        assert!(choices.accepts(FormField::Title, "My title"));
        assert!(choices.accepts(FormField::TargetAudience, "engineers"));

        fs::remove_dir_all(base).ok();
    }
}
