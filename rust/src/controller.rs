//! The form and history state manager.
//!
//! Every user action arrives as a [`Command`] (or one of the generation and
//! export entry points), mutates [`PromptForge`], and reports through
//! [`Refresh`] whether the view has to be redrawn. Presentation lives
//! elsewhere; this module only produces [`ViewSnapshot`]s.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::export::ExportFile;
use crate::form_state::{
    clear_snapshot, load_snapshot, save_snapshot, FieldChoices, FormField, FormValues,
};
use crate::gating::{self, ActionGates};
use crate::generation::{GenerateRequest, GenerateResponse, GenerationError};
use crate::history_store::{HistoryRecord, HistoryStore};
use crate::local_storage::KeyValueStore;
use crate::renderer::render_history_list;
use crate::selection::SelectionState;
use crate::LAST_RESPONSE_KEY;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// `seq` orders edits of one field coming from the page; an edit whose
    /// `seq` is not above the last applied one for that field is dropped.
    SetField {
        field: FormField,
        value: String,
        #[serde(default)]
        seq: Option<u64>,
    },
    /// Debounced recomputation of the generate/save gate.
    RefreshGates,
    Save,
    Clear,
    ClearCrafted,
    ToggleSelectMode,
    ClickRow { id: i64 },
    SetRowChecked { id: i64, checked: bool },
    SelectAll { checked: bool },
    DeleteSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Nothing,
    View,
}

#[derive(Debug, Clone)]
pub struct ForgeSettings {
    pub choices: FieldChoices,
    pub history_max_entries: usize,
    pub export_default_name: String,
    pub model: Option<String>,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            choices: FieldChoices::new(),
            history_max_entries: HistoryStore::DEFAULT_MAX_ENTRIES,
            export_default_name: crate::export::DEFAULT_EXPORT_NAME.to_string(),
            model: None,
        }
    }
}

/// A generation that has been started and awaits its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGeneration {
    pub ticket: u64,
    pub request: GenerateRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub fields: Vec<FieldView>,
    pub crafted: String,
    pub gates: ActionGates,
    pub select_mode: bool,
    pub select_all: bool,
    pub history_count: usize,
    pub history_html: String,
}

pub struct PromptForge {
    storage: Box<dyn KeyValueStore>,
    history: HistoryStore,
    settings: ForgeSettings,
    form: FormValues,
    crafted: String,
    last_generate_ok: bool,
    inputs_ready: bool,
    selection: SelectionState,
    generation_ticket: u64,
    field_seq: BTreeMap<FormField, u64>,
}

impl PromptForge {
    /// Restores the last submitted form from storage.
    pub fn new(mut storage: Box<dyn KeyValueStore>, settings: ForgeSettings) -> Result<Self> {
        let mut form = FormValues::new();
        load_snapshot(storage.as_mut(), &settings.choices, &mut form)?;
        let inputs_ready = gating::inputs_ready(&form);

        Ok(Self {
            storage,
            history: HistoryStore::new(settings.history_max_entries),
            settings,
            form,
            crafted: String::new(),
            last_generate_ok: false,
            inputs_ready,
            selection: SelectionState::new(),
            generation_ticket: 0,
            field_seq: BTreeMap::new(),
        })
    }

    pub fn form(&self) -> &FormValues {
        &self.form
    }

    pub fn crafted(&self) -> &str {
        &self.crafted
    }

    pub fn last_generate_ok(&self) -> bool {
        self.last_generate_ok
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.list(self.storage.as_ref())
    }

    pub fn gates(&self) -> ActionGates {
        ActionGates::derive(
            self.inputs_ready,
            gating::result_ready(self.last_generate_ok, &self.crafted),
            self.selection.any_checked(),
        )
    }

    pub fn apply(&mut self, command: Command, now: DateTime<Utc>) -> Result<Refresh> {
        match command {
            Command::SetField { field, value, seq } => {
                if !self.settings.choices.accepts(field, &value) {
                    return Err(anyhow!("{value:?} is not a valid {}", field.key()));
                }
                if let Some(seq) = seq {
                    let last = self.field_seq.entry(field).or_insert(0);
                    if seq <= *last {
                        tracing::debug!(
                            "dropping out-of-order {} edit (seq {} after {})",
                            field.key(),
                            seq,
                            last
                        );
                        return Ok(Refresh::Nothing);
                    }
                    *last = seq;
                }
                self.form.set(field, value);
                Ok(Refresh::Nothing)
            }
            Command::RefreshGates => {
                self.recompute_inputs_ready();
                Ok(Refresh::View)
            }
            Command::Save => self.save_to_history(now),
            Command::Clear => {
                clear_snapshot(self.storage.as_mut(), &mut self.form)?;
                self.crafted.clear();
                self.last_generate_ok = false;
                self.recompute_inputs_ready();
                Ok(Refresh::View)
            }
            Command::ClearCrafted => {
                self.crafted.clear();
                self.last_generate_ok = false;
                Ok(Refresh::View)
            }
            Command::ToggleSelectMode => {
                let active = self.selection.toggle_mode();
                tracing::debug!("history select mode {}", if active { "on" } else { "off" });
                Ok(Refresh::View)
            }
            Command::ClickRow { id } => self.click_row(id),
            Command::SetRowChecked { id, checked } => Ok(refresh_if(
                self.selection.set_row(id, checked),
            )),
            Command::SelectAll { checked } => {
                let visible: Vec<i64> = self.history().iter().map(|r| r.id).collect();
                Ok(refresh_if(self.selection.set_all(checked, visible)))
            }
            Command::DeleteSelected => self.delete_selected(),
        }
    }

    /// Persists the form and hands out the request to send. Returns `None`
    /// while fewer than the required fields are filled.
    pub fn begin_generate(&mut self) -> Result<Option<PendingGeneration>> {
        if !gating::inputs_ready(&self.form) {
            tracing::debug!("generate ignored: not enough fields filled");
            return Ok(None);
        }

        save_snapshot(self.storage.as_mut(), &self.form)?;
        self.generation_ticket += 1;
        Ok(Some(PendingGeneration {
            ticket: self.generation_ticket,
            request: GenerateRequest::from_form(&self.form, self.settings.model.as_deref()),
        }))
    }

    /// Applies a generation outcome. Outcomes of superseded requests are
    /// dropped so only the most recently issued request can win.
    pub fn finish_generate(
        &mut self,
        ticket: u64,
        outcome: Result<GenerateResponse, GenerationError>,
    ) -> Result<Refresh> {
        if ticket != self.generation_ticket {
            tracing::debug!(
                "dropping response for superseded generation {} (latest {})",
                ticket,
                self.generation_ticket
            );
            return Ok(Refresh::Nothing);
        }

        match outcome {
            Ok(response) => {
                if response.ok {
                    self.storage
                        .set_item(LAST_RESPONSE_KEY, &response.raw.to_string())?;
                }
                self.crafted = response.display_text();
                self.last_generate_ok = response.ok;
            }
            Err(err) => {
                tracing::error!("generation failed: {err}");
                self.crafted = format!("Error: {err}");
                self.last_generate_ok = false;
            }
        }
        self.recompute_inputs_ready();
        Ok(Refresh::View)
    }

    pub fn copy_text(&self) -> Option<String> {
        self.gates().copy.then(|| self.crafted.clone())
    }

    pub fn export_file(&self) -> Option<ExportFile> {
        self.gates().export.then(|| {
            ExportFile::new(
                self.form.get(FormField::Title),
                &self.settings.export_default_name,
                &self.crafted,
            )
        })
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let records = self.history();
        let fields = FormField::ALL
            .into_iter()
            .map(|field| FieldView {
                key: field.key(),
                label: field.label(),
                value: self.form.get(field).to_string(),
                choices: self.settings.choices.for_field(field).map(<[String]>::to_vec),
            })
            .collect();

        ViewSnapshot {
            fields,
            crafted: self.crafted.clone(),
            gates: self.gates(),
            select_mode: self.selection.select_mode(),
            select_all: self.selection.select_all(),
            history_count: records.len(),
            history_html: render_history_list(&records, &self.selection),
        }
    }

    fn recompute_inputs_ready(&mut self) {
        self.inputs_ready = gating::inputs_ready(&self.form);
    }

    fn save_to_history(&mut self, now: DateTime<Utc>) -> Result<Refresh> {
        if !gating::inputs_ready(&self.form) {
            tracing::debug!("save ignored: not enough fields filled");
            return Ok(Refresh::Nothing);
        }

        let record = self
            .history
            .append(self.storage.as_mut(), &self.crafted, &self.form, now)?;
        tracing::debug!("saved history record {}", record.id);
        self.prune_selection();
        Ok(Refresh::View)
    }

    fn click_row(&mut self, id: i64) -> Result<Refresh> {
        if self.selection.select_mode() {
            return Ok(refresh_if(self.selection.toggle_row(id)));
        }

        let Some(record) = self.history.find(self.storage.as_ref(), id) else {
            tracing::debug!("history record {} not found", id);
            return Ok(Refresh::Nothing);
        };

        let mut restored = record.form_values();
        for field in FormField::ALL {
            if !self.settings.choices.accepts(field, restored.get(field)) {
                tracing::debug!("record {} has a stale {} value", id, field.key());
                restored.set(field, "");
            }
        }
        self.form = restored;
        self.crafted = record.prompt;
        self.last_generate_ok = true;
        self.recompute_inputs_ready();
        Ok(Refresh::View)
    }

    fn delete_selected(&mut self) -> Result<Refresh> {
        if !self.selection.any_checked() {
            return Ok(Refresh::Nothing);
        }

        let ids: BTreeSet<i64> = self.selection.checked().clone();
        let removed = self.history.delete(self.storage.as_mut(), &ids)?;
        tracing::debug!("deleted {} history records", removed);
        if self.selection.select_mode() {
            self.selection.toggle_mode();
        }
        Ok(Refresh::View)
    }

    fn prune_selection(&mut self) {
        let visible: BTreeSet<i64> = self.history().iter().map(|r| r.id).collect();
        self.selection.retain_visible(&visible);
    }
}

fn refresh_if(changed: bool) -> Refresh {
    if changed {
        Refresh::View
    } else {
        Refresh::Nothing
    }
}
