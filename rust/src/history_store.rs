use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::form_state::{FormField, FormValues};
use crate::local_storage::KeyValueStore;
use crate::HISTORY_KEY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub ai_role: String,
    #[serde(default)]
    pub additional_info: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub target_audience: String,
}

impl HistoryRecord {
    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Title => &self.title,
            FormField::Context => &self.context,
            FormField::AiRole => &self.ai_role,
            FormField::AdditionalInfo => &self.additional_info,
            FormField::OutputFormat => &self.output_format,
            FormField::TargetAudience => &self.target_audience,
        }
    }

    pub fn form_values(&self) -> FormValues {
        let mut form = FormValues::new();
        for field in FormField::ALL {
            form.set(field, self.field(field));
        }
        form
    }
}

/// Newest-first list of saved generations kept under one storage key.
pub struct HistoryStore {
    max_entries: usize,
}

impl HistoryStore {
    pub const DEFAULT_MAX_ENTRIES: usize = 200;

    pub fn new(max_entries: usize) -> Self {
        let resolved_max = if max_entries == 0 {
            Self::DEFAULT_MAX_ENTRIES
        } else {
            max_entries
        };
        Self {
            max_entries: resolved_max,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn list(&self, storage: &dyn KeyValueStore) -> Vec<HistoryRecord> {
        let Some(raw_text) = storage.get_item(HISTORY_KEY) else {
            return Vec::new();
        };
        match parse_records(&raw_text) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("ignoring unreadable history: {err:#}");
                Vec::new()
            }
        }
    }

    pub fn find(&self, storage: &dyn KeyValueStore, id: i64) -> Option<HistoryRecord> {
        self.list(storage).into_iter().find(|record| record.id == id)
    }

    /// Prepends a record built from the displayed prompt and the form, then
    /// drops the oldest records beyond the cap.
    pub fn append(
        &self,
        storage: &mut dyn KeyValueStore,
        prompt: &str,
        form: &FormValues,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord> {
        let mut records = self.list(storage);
        let record = HistoryRecord {
            id: next_record_id(now, &records)?,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            title: form.get(FormField::Title).to_string(),
            prompt: prompt.to_string(),
            context: form.get(FormField::Context).to_string(),
            ai_role: form.get(FormField::AiRole).to_string(),
            additional_info: form.get(FormField::AdditionalInfo).to_string(),
            output_format: form.get(FormField::OutputFormat).to_string(),
            target_audience: form.get(FormField::TargetAudience).to_string(),
        };

        records.insert(0, record.clone());
        records.truncate(self.max_entries);
        write_records(storage, &records)?;
        Ok(record)
    }

    /// Removes every record whose id is in `ids`; returns how many were removed.
    pub fn delete(&self, storage: &mut dyn KeyValueStore, ids: &BTreeSet<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let records = self.list(storage);
        let before = records.len();
        let kept: Vec<HistoryRecord> = records
            .into_iter()
            .filter(|record| !ids.contains(&record.id))
            .collect();
        let removed = before - kept.len();
        write_records(storage, &kept)?;
        Ok(removed)
    }
}

fn parse_records(raw_text: &str) -> Result<Vec<HistoryRecord>> {
    let raw: Value = serde_json::from_str(raw_text).context("failed to parse history json")?;
    let Some(array) = raw.as_array() else {
        return Err(anyhow::anyhow!("history json is not an array"));
    };

    let mut records = Vec::new();
    for item in array {
        match serde_json::from_value::<HistoryRecord>(item.clone()) {
            Ok(record) => records.push(record),
            Err(err) => tracing::debug!("skipping malformed history record: {err}"),
        }
    }
    Ok(records)
}

fn write_records(storage: &mut dyn KeyValueStore, records: &[HistoryRecord]) -> Result<()> {
    let payload = serde_json::to_string(records).context("failed to serialize history json")?;
    storage.set_item(HISTORY_KEY, &payload)
}

// Wall-clock milliseconds, bumped past the newest stored id so ids keep
// increasing even for saves within the same millisecond.
fn next_record_id(now: DateTime<Utc>, records: &[HistoryRecord]) -> Result<i64> {
    let candidate = now.timestamp_millis();
    match records.iter().map(|record| record.id).max() {
        Some(newest) if newest >= candidate => newest
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("history id space exhausted (newest id {newest})")),
        _ => Ok(candidate),
    }
}
