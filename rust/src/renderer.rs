use chrono::{DateTime, Local};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::history_store::HistoryRecord;
use crate::selection::SelectionState;

pub const UNTITLED: &str = "(no title)";

/// `"<local time> - <title>"`; unparsable timestamps are shown as stored.
pub fn history_label(record: &HistoryRecord) -> String {
    let when = DateTime::parse_from_rfc3339(&record.timestamp)
        .map(|ts| {
            ts.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| record.timestamp.clone());
    let title = if record.title.trim().is_empty() {
        UNTITLED
    } else {
        record.title.as_str()
    };
    format!("{when} - {title}")
}

/// Rows of the `#history` list. In select mode each row leads with a
/// checkbox carrying the record id.
pub fn render_history_list(records: &[HistoryRecord], selection: &SelectionState) -> String {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let id_attr = encode_double_quoted_attribute(&record.id.to_string()).to_string();
        let checkbox = if selection.select_mode() {
            let checked = if selection.is_checked(record.id) {
                " checked"
            } else {
                ""
            };
            format!(
                "<input type=\"checkbox\" class=\"history-check\" data-id=\"{}\"{} />",
                id_attr, checked
            )
        } else {
            String::new()
        };

        rows.push(format!(
            "<li class=\"history-row\" data-id=\"{}\">{}<span>{}</span></li>",
            id_attr,
            checkbox,
            encode_text(&history_label(record))
        ));
    }
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{history_label, render_history_list, UNTITLED};
    use crate::history_store::HistoryRecord;
    use crate::selection::SelectionState;

    fn record(id: i64, title: &str) -> HistoryRecord {
        HistoryRecord {
            id,
            timestamp: "2026-10-17T08:15:00.000Z".to_string(),
            title: title.to_string(),
            prompt: "p".to_string(),
            context: String::new(),
            ai_role: String::new(),
            additional_info: String::new(),
            output_format: String::new(),
            target_audience: String::new(),
        }
    }

    #[test]
    fn label_falls_back_for_blank_title_and_bad_timestamp() {
        let mut blank = record(1, "  ");
        assert!(history_label(&blank).ends_with(&format!(" - {UNTITLED}")));

        blank.timestamp = "yesterday".to_string();
        assert_eq!(history_label(&blank), format!("yesterday - {UNTITLED}"));
    }

    #[test]
    fn rows_escape_titles_and_show_checkboxes_only_in_select_mode() {
        let records = vec![record(10, "<b>bold</b>"), record(11, "plain")];
        let mut selection = SelectionState::new();

        let normal = render_history_list(&records, &selection);
        assert!(normal.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!normal.contains("checkbox"));
        assert_eq!(normal.matches("<li").count(), 2);

        selection.toggle_mode();
        selection.set_row(11, true);
        let selecting = render_history_list(&records, &selection);
        assert!(selecting
            .contains("<input type=\"checkbox\" class=\"history-check\" data-id=\"10\" />"));
        assert!(selecting.contains(
            "<input type=\"checkbox\" class=\"history-check\" data-id=\"11\" checked />"
        ));
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(render_history_list(&[], &SelectionState::new()), "");
    }
}
