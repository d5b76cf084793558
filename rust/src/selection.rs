use std::collections::BTreeSet;

/// Transient multi-select state of the history list. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    select_mode: bool,
    select_all: bool,
    checked: BTreeSet<i64>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_mode(&self) -> bool {
        self.select_mode
    }

    pub fn select_all(&self) -> bool {
        self.select_all
    }

    pub fn checked(&self) -> &BTreeSet<i64> {
        &self.checked
    }

    pub fn is_checked(&self, id: i64) -> bool {
        self.checked.contains(&id)
    }

    pub fn any_checked(&self) -> bool {
        !self.checked.is_empty()
    }

    /// Flips select mode. Rows are rebuilt with fresh checkboxes either way,
    /// so the checked set and the select-all box start over.
    pub fn toggle_mode(&mut self) -> bool {
        self.select_mode = !self.select_mode;
        self.select_all = false;
        self.checked.clear();
        self.select_mode
    }

    pub fn toggle_row(&mut self, id: i64) -> bool {
        if !self.select_mode {
            return false;
        }
        if !self.checked.remove(&id) {
            self.checked.insert(id);
        }
        true
    }

    pub fn set_row(&mut self, id: i64, checked: bool) -> bool {
        if !self.select_mode {
            return false;
        }
        if checked {
            self.checked.insert(id);
        } else {
            self.checked.remove(&id);
        }
        true
    }

    pub fn set_all(&mut self, checked: bool, visible: impl IntoIterator<Item = i64>) -> bool {
        if !self.select_mode {
            return false;
        }
        self.select_all = checked;
        if checked {
            self.checked = visible.into_iter().collect();
        } else {
            self.checked.clear();
        }
        true
    }

    /// Drops checked ids whose rows no longer exist.
    pub fn retain_visible(&mut self, visible: &BTreeSet<i64>) {
        self.checked.retain(|id| visible.contains(id));
    }
}
