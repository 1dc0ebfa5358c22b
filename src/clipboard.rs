//! Clipboard access for the `/cb` directive.

use std::process::Command;

use crate::{Error, Result};

/// A source of clipboard text.
pub trait Clipboard: Send + Sync {
    /// Returns the current clipboard text.
    fn read_text(&self) -> Result<String>;
}

/// Reads the clipboard through the platform's command-line tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    #[cfg(target_os = "windows")]
    fn command() -> Command {
        let mut command = Command::new("powershell");
        command.args(["-NoProfile", "-Command", "Get-Clipboard"]);
        command
    }

    #[cfg(target_os = "macos")]
    fn command() -> Command {
        Command::new("pbpaste")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn command() -> Command {
        let mut command = Command::new("xclip");
        command.args(["-selection", "clipboard", "-o"]);
        command
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        let output = Self::command()
            .output()
            .map_err(|e| Error::io("clipboard tool is not available", e))?;
        if !output.status.success() {
            return Err(Error::user_input(format!(
                "clipboard tool failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let text = String::from_utf8(output.stdout).map_err(|e| {
            Error::encoding("clipboard is not UTF-8 text", Some(Box::new(e)))
        })?;
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }
}
