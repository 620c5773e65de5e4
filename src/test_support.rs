use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

/// Loopback HTTP server answering every request through `handler` with a JSON body.
pub struct StubServer {
    pub base_url: String,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind stub server"));
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let srv = Arc::clone(&server);
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for mut request in srv.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                let rec = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body,
                    authorization,
                };
                let (status, payload) = handler(&rec);
                seen.lock().unwrap().push(rec);
                let json = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("static header");
                let response = Response::from_data(payload.into_bytes())
                    .with_status_code(status)
                    .with_header(json);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            server,
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// A URL nothing listens on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{addr}")
}

/// Deterministic embedder: keyword counts over a tiny vocabulary plus a bias term.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    const VOCABULARY: [&'static str; 5] = ["invoice", "lunch", "meeting", "travel", "budget"];
}

impl crate::llm::Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = Self::VOCABULARY
            .iter()
            .map(|w| lower.matches(w).count() as f32)
            .collect();
        v.push(1.0);
        Ok(v)
    }
}
