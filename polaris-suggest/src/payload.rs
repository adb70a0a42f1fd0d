use serde::Serialize;

/// Lines of context captured on each side of the cursor line.
const CONTEXT_LINES: usize = 5;

/// Editor state at trigger time. `cursor` is a byte offset into `code`.
#[derive(Clone, Debug)]
pub struct EditorSnapshot {
    pub file_name: String,
    pub code: String,
    pub cursor: usize,
}

/// Structural snapshot sent with a completion request: the cursor line split
/// at the cursor, a bounded window of surrounding lines, and the full
/// document. Sized to bound prompt cost while keeping local context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionPayload {
    pub file_name: String,
    pub code: String,
    pub current_line: String,
    pub previous_lines: String,
    pub text_before_cursor: String,
    pub text_after_cursor: String,
    pub next_lines: String,
    /// 1-based line number of the cursor line.
    pub line_number: usize,
}

impl EditorSnapshot {
    /// Build the request payload, or `None` when the document is blank.
    pub fn payload(&self) -> Option<SuggestionPayload> {
        if self.code.trim().is_empty() {
            return None;
        }

        let cursor = self.cursor.min(self.code.len());
        let line_start = self.code[..cursor].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = self.code[cursor..]
            .find('\n')
            .map(|i| cursor + i)
            .unwrap_or(self.code.len());

        let lines: Vec<&str> = self.code.split('\n').collect();
        let line_index = self.code[..line_start].matches('\n').count();
        let previous_start = line_index.saturating_sub(CONTEXT_LINES);
        let next_end = (line_index + 1 + CONTEXT_LINES).min(lines.len());

        Some(SuggestionPayload {
            file_name: self.file_name.clone(),
            code: self.code.clone(),
            current_line: self.code[line_start..line_end].to_string(),
            previous_lines: lines[previous_start..line_index].join("\n"),
            text_before_cursor: self.code[line_start..cursor].to_string(),
            text_after_cursor: self.code[cursor..line_end].to_string(),
            next_lines: lines[line_index + 1..next_end].join("\n"),
            line_number: line_index + 1,
        })
    }
}
