/// Snapshot of one browser's session, passed explicitly into every gated
/// operation. The authoritative flag lives in the server-side store; this
/// copy reflects it as of the start of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub authenticated: bool,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            authenticated: false,
        }
    }
}
