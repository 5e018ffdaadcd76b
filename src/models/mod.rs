pub mod session;
pub mod shared_file;

pub use session::Session;
pub use shared_file::{FileEntry, SharedFile, download_url};
