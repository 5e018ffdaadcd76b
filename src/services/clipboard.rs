use std::sync::{Mutex, RwLock};

/// Access to the single, process-wide text clipboard.
///
/// Implementations never fail: an unavailable clipboard reads as empty and
/// ignores writes. Calls may block briefly, so async callers should go
/// through `spawn_blocking`.
pub trait ClipboardBridge: Send + Sync {
    fn read(&self) -> String;
    fn write(&self, text: &str);
}

/// The host operating system's clipboard
pub struct SystemClipboard {
    // Kept open for the life of the process: on X11 the clipboard contents
    // are served by the owning handle and disappear when it is dropped.
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    fn with_handle<T>(
        &self,
        op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>,
    ) -> Option<T> {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if guard.is_none() {
            match arboard::Clipboard::new() {
                Ok(clipboard) => *guard = Some(clipboard),
                Err(e) => {
                    tracing::debug!(error = %e, "Clipboard unavailable");
                    return None;
                }
            }
        }

        let clipboard = guard.as_mut()?;
        match op(clipboard) {
            Ok(value) => Some(value),
            Err(arboard::Error::ContentNotAvailable) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Clipboard access failed, reopening on next use");
                *guard = None;
                None
            }
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardBridge for SystemClipboard {
    fn read(&self) -> String {
        self.with_handle(|clipboard| clipboard.get_text())
            .unwrap_or_default()
    }

    fn write(&self, text: &str) {
        let _ = self.with_handle(|clipboard| clipboard.set_text(text.to_owned()));
    }
}

/// In-process clipboard for headless hosts and tests
#[derive(Default)]
pub struct MemoryClipboard {
    text: RwLock<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardBridge for MemoryClipboard {
    fn read(&self) -> String {
        self.text
            .read()
            .map(|text| text.clone())
            .unwrap_or_default()
    }

    fn write(&self, text: &str) {
        if let Ok(mut slot) = self.text.write() {
            *slot = text.to_string();
        }
    }
}
