//! Stub fetchers and models shared by unit tests, plus a loopback HTTP
//! server for exercising the real clients.

use crate::error::{CompletionError, FetchError};
use crate::fetch::PageFetcher;
use crate::llm::{ChatModel, ChatRequest};
use crate::page::Page;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

enum Served {
    Html(String),
    Status(u16),
    Redirect(String),
}

/// Serves canned pages; any URL not registered fails with a 404
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, Served>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Served::Html(html.to_string()));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Served::Status(status));
        self
    }

    /// Fetching `from` lands on `to`, which must be registered with `page`
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.pages.insert(from.to_string(), Served::Redirect(to.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let not_found = || FetchError::Status {
            url: url.to_string(),
            status: 404,
        };
        match self.pages.get(url) {
            Some(Served::Html(html)) => Ok(Page::html(url, html.as_str())),
            Some(Served::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Served::Redirect(to)) => match self.pages.get(to) {
                Some(Served::Html(html)) => Ok(Page::html(to.as_str(), html.as_str())),
                _ => Err(not_found()),
            },
            None => Err(not_found()),
        }
    }
}

/// Replies with the content of the last user message
#[derive(Default)]
pub struct EchoModel {
    requests: Mutex<Vec<ChatRequest>>,
}

impl EchoModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        let reply = request.user_content().unwrap_or_default().to_string();
        self.requests.lock().unwrap().push(request);
        Ok(reply)
    }
}

/// Replies with queued answers in order, then fails
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: &str) -> Self {
        self.answers.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn error(self, error: CompletionError) -> Self {
        self.answers.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Api("no scripted answer left".to_string())))
    }
}

/// reqwest client that ignores any proxy configured in the environment
pub fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Loopback HTTP server answering every request with the same canned response
pub struct HttpFixture {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HttpFixture {
    pub async fn serve(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut response = format!(
            "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);

        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Raw requests received so far (head and body), lowercased
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);

        let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= end + 4 + length {
            break;
        }
    }
    String::from_utf8_lossy(&data).to_lowercase()
}
