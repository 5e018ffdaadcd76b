pub mod session;

pub use session::{SESSION_COOKIE, session_layer, signing_key};
