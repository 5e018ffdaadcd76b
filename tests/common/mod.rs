/// Shared test utilities
///
/// Builds the full router around a temporary shared folder and an in-memory
/// clipboard, and helps carry the session cookie between requests.
#[allow(dead_code)]
pub mod app {
    use axum::{
        Router,
        body::{Body, Bytes},
        http::{Request, Response, header},
    };
    use local_sharer::AppState;
    use local_sharer::config::Config;
    use local_sharer::middleware::signing_key;
    use local_sharer::routes;
    use local_sharer::services::{
        ClipboardBridge, FileStore, MemoryClipboard, SessionGate, ShareService,
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    pub const BOUNDARY: &str = "----local-sharer-test-boundary";

    pub struct TestApp {
        pub router: Router,
        pub clipboard: Arc<MemoryClipboard>,
        pub store: Arc<FileStore>,
        pub shutdown: CancellationToken,
        pub tmp_dir: TempDir,
    }

    impl TestApp {
        pub fn new(pin: &str) -> Self {
            let tmp_dir = TempDir::new().unwrap();
            let config = Config::for_upload_dir(tmp_dir.path().join("uploads")).with_pin(pin);
            Self::with_config(config, tmp_dir)
        }

        pub fn with_config(config: Config, tmp_dir: TempDir) -> Self {
            let store = Arc::new(FileStore::new(&config.upload_dir).unwrap());
            let clipboard = Arc::new(MemoryClipboard::new());
            let shutdown = CancellationToken::new();
            let share_service = Arc::new(ShareService::new(
                store.clone(),
                clipboard.clone() as Arc<dyn ClipboardBridge>,
                Arc::new(SessionGate::new(
                    config.pin.clone(),
                    config.session_idle_timeout,
                )),
                shutdown.clone(),
                config.shutdown_delay,
            ));
            let state = AppState {
                share_service,
                cookie_key: signing_key(Some("test-secret")),
            };

            Self {
                router: routes::app(state, config.max_upload_bytes),
                clipboard,
                store,
                shutdown,
                tmp_dir,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }

        /// Open a session and, if a PIN is given, log it in. Returns the
        /// cookie to send with later requests, empty when the server runs
        /// without a PIN and issues none.
        pub async fn session(&self, pin: Option<&str>) -> String {
            let response = self.send(get("/login", None)).await;
            let cookie = session_cookie(&response).unwrap_or_default();
            if let Some(pin) = pin {
                let response = self
                    .send(form_post("/login", Some(&cookie), &[("pin", pin)]))
                    .await;
                assert_eq!(response.status(), 303, "login should succeed");
            }
            cookie
        }
    }

    pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    pub fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    pub fn form_post(uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    /// `multipart/form-data` upload of `(file_name, content)` pairs under
    /// the `files` field, the way the page's upload form sends them
    pub fn upload(cookie: Option<&str>, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, content) in files {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                    name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    /// `name=value` of the session cookie set on a response, if any
    pub fn session_cookie(response: &Response<Body>) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("local_sharer_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    pub fn location(response: &Response<Body>) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    pub async fn body_bytes(response: Response<Body>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}

// ============================================================================
// Archive helpers
// ============================================================================

#[allow(dead_code)]
pub mod archive {
    use std::io::{Cursor, Read};

    /// Sorted `(name, content)` pairs of a zip archive
    pub fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut member = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            member.read_to_end(&mut content).unwrap();
            entries.push((member.name().to_string(), content));
        }
        entries.sort();
        entries
    }
}
