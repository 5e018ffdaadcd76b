pub mod network;
pub mod sanitize;

pub use network::local_ip;
pub use sanitize::{escape_html, is_sanitized, sanitize_filename};
