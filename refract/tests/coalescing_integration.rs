//! Concurrent identical requests must collapse onto one origin fetch.

use rand::RngCore;
use refract::blob::Blob;
use refract::engine::{Engine, Request};
use refract::store::{Fetched, Loader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Origin that answers every key with a fresh random payload after a
/// short delay, so duplicate fetches are observable as differing bytes.
struct RandomOrigin {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Loader for RandomOrigin {
    async fn get(&self, _req: &Request, _key: &str) -> Fetched {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut payload = vec![0u8; 100];
        rand::thread_rng().fill_bytes(&mut payload);
        Fetched::ok(Blob::new(payload))
    }
}

struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn spawn(engine: Arc<Engine>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test HTTP listener");
        let addr = listener.local_addr().expect("read test listener local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, refract::http::router(engine))
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
        tokio::spawn(async move {
            server.await.expect("run test HTTP server");
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interleaved_requests_coalesce_per_key() {
    let origin = Arc::new(RandomOrigin {
        calls: AtomicUsize::new(0),
    });
    let engine = Arc::new(
        Engine::builder()
            .unsafe_requests(true)
            .loader(origin.clone())
            .build(),
    );
    let server = Arc::new(TestServer::spawn(engine).await);

    let client = reqwest::Client::new();
    let mut handles = Vec::new();
    for _ in 0..10 {
        for image in ["a", "b"] {
            let client = client.clone();
            let url = server.url(&format!("unsafe/{image}"));
            handles.push(tokio::spawn(async move {
                let response = client.get(url).send().await.expect("request");
                assert_eq!(response.status().as_u16(), 200);
                (image, response.bytes().await.expect("body").to_vec())
            }));
        }
    }

    let mut seen: HashMap<&str, Vec<u8>> = HashMap::new();
    for handle in handles {
        let (image, body) = handle.await.expect("join");
        assert_eq!(body.len(), 100);
        match seen.get(image) {
            Some(first) => assert_eq!(
                first, &body,
                "all concurrent responses for {image} must be byte-identical"
            ),
            None => {
                seen.insert(image, body);
            }
        }
    }

    // The two keys resolved to different payloads.
    assert_ne!(seen["a"], seen["b"]);
    // One origin fetch per key while the requests overlapped.
    assert_eq!(origin.calls.load(Ordering::SeqCst), 2);
}
