//! Pure render functions from console state to printable lines

use crate::model::{ConversationState, Dialog, ProfileEntry, Speaker, TranscriptEntry, Turn};

/// One row of the dialog list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRow {
    pub index: usize,
    pub name: String,
    pub dialog_id: String,
    /// The active conversation runs on this dialog
    pub active: bool,
}

pub fn dialog_rows(dialogs: &[Dialog], active_dialog: Option<&str>) -> Vec<DialogRow> {
    dialogs
        .iter()
        .enumerate()
        .map(|(index, dialog)| DialogRow {
            index,
            name: dialog.name.clone(),
            dialog_id: dialog.dialog_id.clone(),
            active: active_dialog == Some(dialog.dialog_id.as_str()),
        })
        .collect()
}

pub fn render_dialog_rows(rows: &[DialogRow]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["📭 No dialogs yet. Use /create <name> <file.xml> to upload one.".to_string()];
    }
    rows.iter()
        .map(|row| {
            let marker = if row.active { "▶" } else { " " };
            format!("{marker} [{}] {}  ({})", row.index, row.name, row.dialog_id)
        })
        .collect()
}

/// Session information panel
pub fn info_lines(dialog_name: Option<&str>, state: &ConversationState) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    if let Some(name) = dialog_name {
        lines.push(format!("Dialog name: {name}"));
    }
    lines.push(format!("Dialog id: {}", state.dialog_id));
    lines.push(format!("Conversation id: {}", state.conversation_id));
    lines.push(format!("Client id: {}", state.client_id));
    lines
}

pub fn profile_lines(entries: &[ProfileEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| !entry.value.is_empty())
        .map(|entry| format!("{}: {}", entry.name, entry.value))
        .collect()
}

/// Bot reply as terminal text, with a marker when the default answer was used
pub fn bot_text(turn: &Turn) -> String {
    let text = plain_text(&turn.joined());
    if turn.default_answer_used {
        format!("{text}  (default answer)")
    } else {
        text
    }
}

pub fn transcript_line(entry: &TranscriptEntry) -> String {
    let speaker = match entry.speaker {
        Speaker::Human => "👤 You",
        Speaker::Bot => "🤖 Bot",
    };
    format!("{} {}: {}", entry.at.format("%H:%M:%S"), speaker, entry.text)
}

/// Dialog responses may carry markup; show only their text.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for c in html.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag.trim_start_matches('/').trim_end_matches('/').trim();
                if name.eq_ignore_ascii_case("br") || name.eq_ignore_ascii_case("p") {
                    out.push('\n');
                }
            }
            (true, c) => tag.push(c),
            (false, c) => out.push(c),
        }
    }

    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
