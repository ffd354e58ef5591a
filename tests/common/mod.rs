//! Shared fixtures: a raw-TCP mock backend and a fixed session oracle.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_bff::auth::{Identity, SessionValidator};
use pulse_bff::config::BackendConfig;
use pulse_bff::http::parser::{parse_http_request, ParseError};
use pulse_bff::http::request::Request;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SERVICE_KEY: &str = "svc-key-7f3a9c";

/// Session oracle that always answers the same way.
pub struct FixedSession(pub Option<Identity>);

impl FixedSession {
    pub fn signed_in(email: &str) -> Self {
        Self(Some(Identity::new(email)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl SessionValidator for FixedSession {
    async fn validate(&self, _request: &Request) -> Option<Identity> {
        self.0.clone()
    }
}

enum Behaviour {
    Reply(Vec<u8>),
    Hang,
}

/// A backend listening on an ephemeral localhost port.
pub struct MockBackend {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl MockBackend {
    /// Replies to every request with the given raw HTTP response.
    pub async fn replying(raw_response: impl Into<Vec<u8>>) -> Self {
        Self::spawn(Behaviour::Reply(raw_response.into())).await
    }

    /// Reads requests but never answers.
    pub async fn hanging() -> Self {
        Self::spawn(Behaviour::Hang).await
    }

    async fn spawn(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let behaviour = Arc::new(behaviour);

        let (hits_task, requests_task) = (Arc::clone(&hits), Arc::clone(&requests));
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                hits_task.fetch_add(1, Ordering::SeqCst);
                let behaviour = Arc::clone(&behaviour);
                let requests = Arc::clone(&requests_task);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let request = loop {
                        match parse_http_request(&buf) {
                            Ok((request, _)) => break request,
                            Err(ParseError::Incomplete) => {}
                            Err(_) => return,
                        }
                        let mut chunk = [0u8; 4096];
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    };
                    requests.lock().unwrap().push(request);

                    match &*behaviour {
                        Behaviour::Reply(raw) => {
                            let _ = socket.write_all(raw).await;
                            let _ = socket.shutdown().await;
                        }
                        Behaviour::Hang => {
                            tokio::time::sleep(Duration::from_secs(3600)).await;
                        }
                    }
                });
            }
        });

        Self {
            url,
            hits,
            requests,
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Request {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend received no request")
    }

    pub fn config(&self, service_key: Option<&str>) -> BackendConfig {
        BackendConfig::with_url(&self.url, service_key).unwrap()
    }
}

/// A localhost URL nothing is listening on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Raw HTTP response with an explicit Content-Length.
pub fn raw_response(status_line: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut raw = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    raw.push_str(&format!("content-length: {}\r\nconnection: close\r\n\r\n", body.len()));
    raw.push_str(body);
    raw.into_bytes()
}
