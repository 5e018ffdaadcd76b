pub mod clipboard;
pub mod file_store;
pub mod session_gate;
pub mod share_service;

pub use clipboard::{ClipboardBridge, MemoryClipboard, SystemClipboard};
pub use file_store::{ArchiveStream, FileStore, PendingUpload, StoreError};
pub use session_gate::{AuthError, SessionGate};
pub use share_service::{ActiveTab, HomePage, ShareError, SharePage, ShareService};
