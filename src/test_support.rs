//! Test doubles: a raw-TCP HTTP endpoint and a scripted link feed.

use crate::library::Link;
use crate::sync::{FeedSnapshot, LinkFeed, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned behaviour for a [`MockEndpoint`].
#[derive(Debug, Clone)]
pub enum Reply {
    Json { status: u16, body: String },
    /// Read the request and never answer.
    Hang,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Json {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: String,
    pub body: String,
}

/// One-port HTTP responder on 127.0.0.1 that records every request.
pub struct MockEndpoint {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockEndpoint {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let recorded = recorded.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    handle_connection(stream, reply, recorded).await;
                });
            }
        });

        Self { addr, requests }
    }

    /// A URL on which nothing is listening.
    pub async fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/links", addr)
    }

    pub fn url(&self) -> String {
        format!("http://{}/links", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    reply: Reply,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let (request_line, headers) = head.split_once("\r\n").unwrap_or((head.as_str(), ""));
    let body_end = buf.len().min(body_start + content_length);
    recorded.lock().unwrap().push(RecordedRequest {
        request_line: request_line.to_string(),
        headers: headers.to_string(),
        body: String::from_utf8_lossy(&buf[body_start.min(body_end)..body_end]).to_string(),
    });

    match reply {
        Reply::Json { status, body } => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// A [`LinkFeed`] whose fetch results are scripted ahead of time and whose
/// publish endpoint is an in-memory list.
#[derive(Default)]
pub struct ScriptedFeed {
    fetches: Mutex<VecDeque<Result<FeedSnapshot, String>>>,
    published: Mutex<Vec<Value>>,
    fail_publish: Mutex<Option<String>>,
    publish_delay: Mutex<Option<Duration>>,
    fetch_calls: Mutex<usize>,
}

impl ScriptedFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful fetch. Once the queue is empty, fetches fail.
    pub fn push_links(&self, links: Vec<Link>, categories: &[&str]) {
        self.fetches.lock().unwrap().push_back(Ok(FeedSnapshot {
            endpoint: "scripted".into(),
            links,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }));
    }

    pub fn push_failure(&self, message: &str) {
        self.fetches
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn fail_publish(&self, message: &str) {
        *self.fail_publish.lock().unwrap() = Some(message.to_string());
    }

    /// Delay between reading and writing the publish list.
    pub fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = Some(delay);
    }

    pub fn published(&self) -> Vec<Value> {
        self.published.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        *self.fetch_calls.lock().unwrap()
    }
}

#[async_trait]
impl LinkFeed for ScriptedFeed {
    async fn fetch_links(&self) -> Result<FeedSnapshot, SyncError> {
        *self.fetch_calls.lock().unwrap() += 1;
        let next = self.fetches.lock().unwrap().pop_front();
        tokio::task::yield_now().await;
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(SyncError::MalformedResponse(message)),
            None => Err(SyncError::AllEndpointsFailed(1)),
        }
    }

    async fn fetch_published(&self) -> Result<Vec<Value>, SyncError> {
        let snapshot = self.published.lock().unwrap().clone();
        let delay = *self.publish_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn publish(&self, links: Vec<Value>) -> Result<(), SyncError> {
        if let Some(message) = self.fail_publish.lock().unwrap().clone() {
            return Err(SyncError::MalformedResponse(message));
        }
        *self.published.lock().unwrap() = links;
        Ok(())
    }

    fn api_url(&self) -> String {
        "scripted://feed".to_string()
    }
}

/// A shared link as the feed would return it.
pub fn shared_link(id: &str, category: &str) -> Link {
    Link {
        id: id.to_string(),
        title: Some(format!("Title {}", id)),
        url: format!("https://{}.example", id),
        category: Some(category.to_string()),
        is_shared: true,
        ..Link::default()
    }
}
