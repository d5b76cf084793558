use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::local_storage::KeyValueStore;
use crate::LAST_KEY_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Title,
    Context,
    AiRole,
    AdditionalInfo,
    OutputFormat,
    TargetAudience,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::Title,
        FormField::Context,
        FormField::AiRole,
        FormField::AdditionalInfo,
        FormField::OutputFormat,
        FormField::TargetAudience,
    ];

    /// Fields that count towards the generate/save threshold.
    pub const PRIMARY: [FormField; 5] = [
        FormField::Title,
        FormField::Context,
        FormField::AiRole,
        FormField::AdditionalInfo,
        FormField::OutputFormat,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::Context => "context",
            FormField::AiRole => "ai_role",
            FormField::AdditionalInfo => "additional_info",
            FormField::OutputFormat => "output_format",
            FormField::TargetAudience => "target_audience",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Context => "Context",
            FormField::AiRole => "AI Role",
            FormField::AdditionalInfo => "Additional Info",
            FormField::OutputFormat => "Output Format",
            FormField::TargetAudience => "Target Audience",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key.trim())
    }

    pub fn storage_key(self) -> String {
        format!("{LAST_KEY_PREFIX}{}", self.key())
    }
}

/// Current values of the form controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    values: BTreeMap<FormField, String>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: FormField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or_default()
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_filled(&self, field: FormField) -> bool {
        !self.get(field).trim().is_empty()
    }

    pub fn filled_primary_count(&self) -> usize {
        FormField::PRIMARY
            .iter()
            .filter(|field| self.is_filled(**field))
            .count()
    }
}

/// Valid options for constrained-choice fields. A field without an entry is
/// free text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChoices {
    choices: BTreeMap<FormField, Vec<String>>,
}

impl FieldChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty list removes the constraint instead of allowing only blank.
    pub fn insert(&mut self, field: FormField, choices: Vec<String>) {
        if choices.is_empty() {
            self.choices.remove(&field);
        } else {
            self.choices.insert(field, choices);
        }
    }

    pub fn for_field(&self, field: FormField) -> Option<&[String]> {
        self.choices.get(&field).map(Vec::as_slice)
    }

    /// Blank always passes, mirroring the placeholder option of a select.
    pub fn accepts(&self, field: FormField, value: &str) -> bool {
        match self.for_field(field) {
            Some(choices) => value.is_empty() || choices.iter().any(|c| c == value),
            None => true,
        }
    }
}

/// Restores the last submitted values into `form`. Stored values that are no
/// longer valid choices are cleared from both the form and storage.
pub fn load_snapshot(
    storage: &mut dyn KeyValueStore,
    choices: &FieldChoices,
    form: &mut FormValues,
) -> Result<()> {
    for field in FormField::ALL {
        let key = field.storage_key();
        let Some(stored) = storage.get_item(&key) else {
            continue;
        };

        if choices.accepts(field, &stored) {
            form.set(field, stored);
        } else {
            tracing::debug!("dropping stale {} value {:?}", field.key(), stored);
            form.set(field, "");
            storage.remove_item(&key)?;
        }
    }
    Ok(())
}

pub fn save_snapshot(storage: &mut dyn KeyValueStore, form: &FormValues) -> Result<()> {
    for field in FormField::ALL {
        let key = field.storage_key();
        if form.is_filled(field) {
            storage.set_item(&key, form.get(field))?;
        } else {
            storage.remove_item(&key)?;
        }
    }
    Ok(())
}

pub fn clear_snapshot(storage: &mut dyn KeyValueStore, form: &mut FormValues) -> Result<()> {
    form.clear();
    for field in FormField::ALL {
        storage.remove_item(&field.storage_key())?;
    }
    Ok(())
}
