use crate::error::{Error, Result};

/// Split a `key=value; key=value` configuration string into entries. A `;`
/// inside a double-quoted value does not terminate the entry; surrounding
/// quotes are stripped from the value.
pub fn entries(source: &str) -> Result<Vec<(String, String)>> {
    let mut parsed = Vec::new();
    for entry in split_entries(source) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected key=value entry, got '{entry}'")))?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        parsed.push((key.trim().to_ascii_lowercase(), value.to_string()));
    }
    Ok(parsed)
}

fn split_entries(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, ch) in source.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}
