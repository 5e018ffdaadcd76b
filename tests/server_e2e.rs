mod common;

#[cfg(test)]
mod tests {
    use super::common::archive;
    use local_sharer::AppState;
    use local_sharer::config::Config;
    use local_sharer::middleware::signing_key;
    use local_sharer::routes;
    use local_sharer::services::{
        ClipboardBridge, FileStore, MemoryClipboard, SessionGate, ShareService,
    };
    use std::future::IntoFuture;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    struct RunningServer {
        addr: SocketAddr,
        clipboard: Arc<MemoryClipboard>,
        shutdown: CancellationToken,
        handle: JoinHandle<std::io::Result<()>>,
        _tmp_dir: TempDir,
    }

    impl RunningServer {
        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }
    }

    async fn start_server(pin: &str) -> RunningServer {
        let tmp_dir = TempDir::new().unwrap();
        let config = Config::for_upload_dir(tmp_dir.path().join("uploads")).with_pin(pin);

        let store = Arc::new(FileStore::new(&config.upload_dir).unwrap());
        let clipboard = Arc::new(MemoryClipboard::new());
        let shutdown = CancellationToken::new();
        let share_service = Arc::new(ShareService::new(
            store,
            clipboard.clone() as Arc<dyn ClipboardBridge>,
            Arc::new(SessionGate::new(config.pin.clone(), config.session_idle_timeout)),
            shutdown.clone(),
            config.shutdown_delay,
        ));
        let app = routes::app(
            AppState {
                share_service,
                cookie_key: signing_key(None),
            },
            config.max_upload_bytes,
        );

        let listener = tokio::net::TcpListener::bind(SocketAddr::new(config.host, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.clone().cancelled_owned())
                .into_future(),
        );

        RunningServer {
            addr,
            clipboard,
            shutdown,
            handle,
            _tmp_dir: tmp_dir,
        }
    }

    fn browser() -> reqwest::Client {
        reqwest::Client::builder().cookie_store(true).build().unwrap()
    }

    async fn file_names(client: &reqwest::Client, server: &RunningServer) -> Vec<String> {
        let files: Vec<serde_json::Value> = client
            .get(server.url("/api/files"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        files
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_browser_session_flow() {
        let server = start_server("2468").await;
        let client = browser();

        // Fresh visit lands on the login view
        let html = client
            .get(server.url("/"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(html.contains(r#"action="/login""#));

        // Logging in redirects to the shared page
        let response = client
            .post(server.url("/login"))
            .form(&[("pin", "2468")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().contains(r#"id="Clipboard""#));

        // Another device shares text through the form
        let response = client
            .post(server.url("/"))
            .form(&[("text_to_send", "from the phone")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
        assert_eq!(server.clipboard.read(), "from the phone");

        // The host copies something; pollers see it
        server.clipboard.write("from the laptop");
        let text = client
            .get(server.url("/api/clipboard"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "from the laptop");
    }

    #[tokio::test]
    async fn test_upload_poll_and_download() {
        let server = start_server("").await;
        let client = browser();

        assert!(file_names(&client, &server).await.is_empty());

        let form = reqwest::multipart::Form::new()
            .part(
                "files",
                reqwest::multipart::Part::bytes(b"first file".to_vec()).file_name("one.txt"),
            )
            .part(
                "files",
                reqwest::multipart::Part::bytes(vec![7u8; 256 * 1024]).file_name("two.bin"),
            );
        let response = client
            .post(server.url("/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        // Redirect followed to the Files tab
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.url().as_str().ends_with("/?active_tab=Files"));

        let mut names = file_names(&client, &server).await;
        names.sort();
        assert_eq!(names, vec!["one.txt", "two.bin"]);

        let bytes = client
            .get(server.url("/uploads/two.bin"))
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(bytes.len(), 256 * 1024);

        let zip = client
            .get(server.url("/download-zip"))
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let entries = archive::entries(&zip);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("one.txt".to_string(), b"first file".to_vec()));
        assert_eq!(entries[1].1, vec![7u8; 256 * 1024]);
    }

    #[tokio::test]
    async fn test_remote_shutdown_stops_server() {
        let server = start_server("").await;
        let client = browser();

        let body: serde_json::Value = client
            .post(server.url("/shutdown"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);

        let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
            .await
            .expect("server stops after shutdown request");
        assert!(result.unwrap().is_ok());
        assert!(server.shutdown.is_cancelled());
    }
}
