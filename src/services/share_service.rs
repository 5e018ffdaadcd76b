use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::models::{FileEntry, Session, SharedFile};
use crate::services::clipboard::ClipboardBridge;
use crate::services::file_store::{ArchiveStream, FileStore, PendingUpload, StoreError};
use crate::services::session_gate::SessionGate;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which half of the page is shown first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveTab {
    #[default]
    Clipboard,
    Files,
}

impl ActiveTab {
    /// Lenient parse of the `active_tab` query value
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("files") => Self::Files,
            _ => Self::Clipboard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clipboard => "Clipboard",
            Self::Files => "Files",
        }
    }
}

/// Everything the shared page shows on first load
#[derive(Debug, Clone)]
pub struct SharePage {
    pub clipboard_text: String,
    pub files: Vec<FileEntry>,
    pub active_tab: ActiveTab,
}

#[derive(Debug, Clone)]
pub enum HomePage {
    Login { pin_required: bool },
    Share(SharePage),
}

/// Orchestrates the gate, the file store and the clipboard for one request
/// at a time. Holds no per-client state beyond the session store, so any
/// number of clients can poll it.
pub struct ShareService {
    file_store: Arc<FileStore>,
    clipboard: Arc<dyn ClipboardBridge>,
    session_gate: Arc<SessionGate>,
    shutdown: CancellationToken,
    shutdown_delay: Duration,
}

impl ShareService {
    pub fn new(
        file_store: Arc<FileStore>,
        clipboard: Arc<dyn ClipboardBridge>,
        session_gate: Arc<SessionGate>,
        shutdown: CancellationToken,
        shutdown_delay: Duration,
    ) -> Self {
        Self {
            file_store,
            clipboard,
            session_gate,
            shutdown,
            shutdown_delay,
        }
    }

    pub fn session_gate(&self) -> &SessionGate {
        &self.session_gate
    }

    pub fn file_store(&self) -> &FileStore {
        &self.file_store
    }

    /// Fail with [`ShareError::Unauthorized`] unless the session may use
    /// gated operations.
    pub fn authorize(&self, session: &Session) -> Result<(), ShareError> {
        if self.session_gate.is_authenticated(session) {
            Ok(())
        } else {
            Err(ShareError::Unauthorized)
        }
    }

    async fn read_clipboard(&self) -> String {
        let clipboard = Arc::clone(&self.clipboard);
        tokio::task::spawn_blocking(move || clipboard.read())
            .await
            .unwrap_or_default()
    }

    async fn list_entries(&self) -> Result<Vec<FileEntry>, ShareError> {
        let files = self.file_store.list().await?;
        Ok(files.iter().map(FileEntry::from).collect())
    }

    pub async fn render_home(
        &self,
        session: &Session,
        active_tab: ActiveTab,
    ) -> Result<HomePage, ShareError> {
        if self.authorize(session).is_err() {
            return Ok(HomePage::Login {
                pin_required: self.session_gate.is_enabled(),
            });
        }

        let clipboard_text = self.read_clipboard().await;
        let files = self.list_entries().await?;

        Ok(HomePage::Share(SharePage {
            clipboard_text,
            files,
            active_tab,
        }))
    }

    pub async fn submit_text(&self, session: &Session, text: String) -> Result<(), ShareError> {
        self.authorize(session)?;

        let len = text.len();
        let clipboard = Arc::clone(&self.clipboard);
        if let Err(e) = tokio::task::spawn_blocking(move || clipboard.write(&text)).await {
            tracing::warn!(error = %e, "Clipboard write task failed");
        }

        tracing::debug!(bytes = len, "Clipboard updated");
        Ok(())
    }

    /// Start receiving one uploaded file. Returns the pending upload so the
    /// caller can stream the body into it.
    pub async fn begin_upload(
        &self,
        session: &Session,
        file_name: &str,
    ) -> Result<PendingUpload, ShareError> {
        self.authorize(session)?;
        Ok(self.file_store.begin_upload(file_name).await?)
    }

    pub async fn poll_clipboard(&self, session: &Session) -> Result<String, ShareError> {
        self.authorize(session)?;
        Ok(self.read_clipboard().await)
    }

    pub async fn poll_files(&self, session: &Session) -> Result<Vec<FileEntry>, ShareError> {
        self.authorize(session)?;
        self.list_entries().await
    }

    pub async fn download_one(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<(fs::File, SharedFile), ShareError> {
        self.authorize(session)?;
        Ok(self.file_store.fetch(name).await?)
    }

    pub async fn download_all(&self, session: &Session) -> Result<ArchiveStream, ShareError> {
        self.authorize(session)?;
        Ok(self.file_store.bundle_all().await?)
    }

    /// Stop the server after a short delay, leaving time for the response to
    /// reach the client.
    pub fn shutdown(&self, session: &Session) -> Result<(), ShareError> {
        self.authorize(session)?;

        tracing::warn!(delay = ?self.shutdown_delay, "Shutdown requested by client");

        let token = self.shutdown.clone();
        let delay = self.shutdown_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });

        Ok(())
    }
}
