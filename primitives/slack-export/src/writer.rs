//! Writes one JSON file per conversation.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::{ExportError, Result};
use crate::model::{Conversation, ExportedMessage};

/// Characters that cannot appear in a file name on common platforms.
const FORBIDDEN: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;

const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".partial";
const EXTENSION: &str = ".json";

/// Replaces characters that are unsafe in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned.trim().trim_matches('.').to_string()
}

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `<dir>/<id>_<description>.json`
///
/// The description is shortened so that the name, and the temporary name
/// used while writing, both fit in [`MAX_FILE_NAME_BYTES`].
pub fn output_path(dir: &Path, conversation: &Conversation, description: &str) -> PathBuf {
    let budget = MAX_FILE_NAME_BYTES - TEMP_PREFIX.len() - TEMP_SUFFIX.len() - EXTENSION.len();

    let id = sanitize_file_name(&conversation.id);
    let id = truncate_to_bytes(&id, budget);

    let description = sanitize_file_name(description);
    let room = budget.saturating_sub(id.len() + 1);
    let description = truncate_to_bytes(&description, room)
        .trim_end()
        .trim_end_matches('.');

    let stem = if description.is_empty() {
        id.to_string()
    } else {
        format!("{id}_{description}")
    };
    dir.join(format!("{stem}{EXTENSION}"))
}

/// Serializes `messages` as a tab indented JSON array.
pub fn render(messages: &[ExportedMessage]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    messages.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Writes the conversation file, replacing any previous export.
///
/// The content goes to a hidden sibling first and is renamed into place, so
/// the target either holds the previous export or the complete new one.
pub fn write_conversation(path: &Path, messages: &[ExportedMessage]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

    let bytes = render(messages).map_err(|e| ExportError::io(path, e.into()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!("{TEMP_PREFIX}{file_name}{TEMP_SUFFIX}"));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(ExportError::io(path, e));
    }
    Ok(())
}
