pub const DEFAULT_EXPORT_NAME: &str = "crafted_prompt";
/// Title length limit in UTF-16 code units, as a browser counts string length.
const MAX_TITLE_UNITS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content: String,
}

impl ExportFile {
    pub const CONTENT_TYPE: &'static str = "text/plain; charset=utf-8";

    pub fn new(title: &str, default_name: &str, content: &str) -> Self {
        Self {
            file_name: export_file_name(title, default_name),
            content: content.to_string(),
        }
    }
}

/// Turns a free-form title into a filename stem made of `[A-Za-z0-9_-]`.
pub fn sanitize_filename(title: &str) -> String {
    let truncated = truncate_utf16(title.trim(), MAX_TITLE_UNITS);

    let mut out = String::with_capacity(truncated.len());
    let mut in_whitespace = false;
    for ch in truncated.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    collapsed
}

// A character that would straddle the limit is dropped whole; half of a
// surrogate pair could never survive the character filter anyway.
fn truncate_utf16(text: &str, max_units: usize) -> &str {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return &text[..idx];
        }
    }
    text
}

pub fn export_file_name(title: &str, default_name: &str) -> String {
    let safe = sanitize_filename(title);
    if safe.is_empty() {
        let fallback = sanitize_filename(default_name);
        if fallback.is_empty() {
            return format!("{DEFAULT_EXPORT_NAME}.txt");
        }
        return format!("{fallback}.txt");
    }
    format!("{safe}.txt")
}

#[cfg(test)]
mod tests {
    use super::{
        export_file_name, sanitize_filename, truncate_utf16, ExportFile, DEFAULT_EXPORT_NAME,
    };

    #[test]
    fn sanitizes_punctuation_and_spaces() {
        assert_eq!(sanitize_filename("My Prompt!! v2"), "My_Prompt_v2");
        assert_eq!(sanitize_filename("  tabs\tand\n\nnewlines  "), "tabs_and_newlines");
        assert_eq!(sanitize_filename("keep-dash__and___underscores"), "keep-dash_and_underscores");
    }

    #[test]
    fn disallowed_only_title_falls_back_to_default() {
        assert_eq!(sanitize_filename("!!! ???"), "_");
        assert_eq!(sanitize_filename("!!!???"), "");
        assert_eq!(sanitize_filename("日本語"), "");
        assert_eq!(
            export_file_name("!!!???", DEFAULT_EXPORT_NAME),
            "crafted_prompt.txt"
        );
    }

    #[test]
    fn truncates_before_filtering() {
        let title = format!("{}{}", "a".repeat(48), "!!bbbb");
        assert_eq!(sanitize_filename(&title), "a".repeat(48));
    }

    #[test]
    fn limit_counts_utf16_units() {
        let title = format!("{}\u{1F600}bbbb", "a".repeat(49));
        assert_eq!(sanitize_filename(&title), "a".repeat(49));

        let emoji_first = format!("\u{1F600}\u{1F600}{}", "c".repeat(60));
        assert_eq!(sanitize_filename(&emoji_first), "c".repeat(46));

        let accented = "é".repeat(60);
        assert_eq!(truncate_utf16(&accented, 50).chars().count(), 50);
    }

    #[test]
    fn export_file_uses_title() {
        let file = ExportFile::new("Weekly Report", "fallback", "body");
        assert_eq!(file.file_name, "Weekly_Report.txt");
        assert_eq!(file.content, "body");

        let untitled = ExportFile::new("", "fallback", "body");
        assert_eq!(untitled.file_name, "fallback.txt");
    }
}
