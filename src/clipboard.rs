use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use std::io::Write;
use std::sync::Mutex;
use crate::error::ChatError;

/// Best-effort text copy. Failures are reported to the caller, who is
/// expected to treat them as transient.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<(), ChatError>;
}

/// Sets the terminal's clipboard through an OSC 52 escape sequence.
pub struct TerminalClipboard;

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text.as_bytes()))
}

impl Clipboard for TerminalClipboard {
    fn copy(&self, text: &str) -> Result<(), ChatError> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| ChatError::Clipboard(e.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn copy(&self, text: &str) -> Result<(), ChatError> {
        let mut guard = self.contents
            .lock()
            .map_err(|_| ChatError::Clipboard("clipboard lock poisoned".to_string()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}
