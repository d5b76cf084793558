use serde::Serialize;

use crate::form_state::FormValues;

/// Minimum number of filled primary fields before generate/save open up.
pub const MIN_FILLED_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionGates {
    pub generate: bool,
    pub save: bool,
    pub copy: bool,
    pub export: bool,
    pub delete_history: bool,
}

impl ActionGates {
    pub fn derive(inputs_ready: bool, result_ready: bool, any_checked: bool) -> Self {
        Self {
            generate: inputs_ready,
            save: inputs_ready,
            copy: result_ready,
            export: result_ready,
            delete_history: any_checked,
        }
    }
}

pub fn inputs_ready(form: &FormValues) -> bool {
    form.filled_primary_count() >= MIN_FILLED_FIELDS
}

pub fn result_ready(last_generate_ok: bool, crafted: &str) -> bool {
    last_generate_ok && !crafted.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::{inputs_ready, result_ready, ActionGates};
    use crate::form_state::{FormField, FormValues};

    #[test]
    fn inputs_ready_iff_three_primary_fields_filled() {
        for mask in 0u32..(1 << FormField::PRIMARY.len()) {
            let mut form = FormValues::new();
            for (bit, field) in FormField::PRIMARY.iter().enumerate() {
                let value = if mask & (1 << bit) != 0 { "filled" } else { "  " };
                form.set(*field, value);
            }
            form.set(FormField::TargetAudience, "ignored for gating");

            let expected = mask.count_ones() >= 3;
            assert_eq!(inputs_ready(&form), expected, "mask {mask:05b}");
        }
    }

    #[test]
    fn three_filled_with_empty_fourth_stays_enabled() {
        let mut form = FormValues::new();
        form.set(FormField::Title, "T");
        form.set(FormField::Context, "C");
        form.set(FormField::AiRole, "R");
        form.set(FormField::AdditionalInfo, "");

        let gates = ActionGates::derive(inputs_ready(&form), false, false);
        assert!(gates.generate);
        assert!(gates.save);
    }

    #[test]
    fn result_needs_success_and_text() {
        assert!(result_ready(true, "X"));
        assert!(!result_ready(true, " \n "));
        assert!(!result_ready(false, "Error: bad input"));
    }
}
