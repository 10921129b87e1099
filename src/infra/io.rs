//! Response text input for the CLI surface

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Read the response text from a file or the system clipboard.
pub fn read_response_input(file: Option<&Path>, from_clipboard: bool) -> Result<String> {
    if let Some(path) = file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read response file: {:?}", path));
    }
    if from_clipboard {
        return get_clipboard_content();
    }
    anyhow::bail!("Must specify either RESPONSE_FILE or --from-clipboard")
}

/// Get content from system clipboard
fn get_clipboard_content() -> Result<String> {
    use arboard::Clipboard;
    let mut clipboard = Clipboard::new().context("Failed to access clipboard")?;
    clipboard
        .get_text()
        .context("Failed to get text from clipboard")
}
