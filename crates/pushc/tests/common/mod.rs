#![allow(dead_code)]

use pushc::config::TransportConfig;
use pushc::directory::DirectoryStore;
use pushc::request::ClientIdentity;
use pushc::PushServiceClient;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub const NUMBER: &str = "+15551234567";
pub const PASSWORD: &str = "hunter2";

/// A request as the mock server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// A canned reply.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::status(status)
            .header("Content-Type", "application/json")
            .body(body.as_bytes().to_vec())
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// Single-threaded HTTP/1.1 server answering one request per connection
/// from a fixed script. Once the script runs out the listener is dropped
/// and further connections are refused.
pub struct MockServer {
    addr: SocketAddr,
    listener: Option<TcpListener>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        Self {
            addr,
            listener: Some(listener),
            requests: Arc::new(Mutex::new(Vec::new())),
            handle: None,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn serve(&mut self, script: Vec<MockResponse>) {
        let listener = self.listener.take().expect("server already started");
        let requests = self.requests.clone();
        self.handle = Some(std::thread::spawn(move || {
            for response in script {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                handle_connection(stream, &response, &requests);
            }
        }));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle_connection(
    stream: TcpStream,
    response: &MockResponse,
    requests: &Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body,
    });

    let mut out = stream;
    let mut head = format!(
        "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let _ = out.write_all(head.as_bytes());
    let _ = out.write_all(&response.body);
    let _ = out.flush();
}

/// Client pointed at `server` over plain HTTP with pinning disabled.
pub fn test_client(server: &MockServer) -> PushServiceClient {
    client_for(&server.url())
}

pub fn client_for(url: &str) -> PushServiceClient {
    let config = TransportConfig::new(url).without_pinning();
    PushServiceClient::new(&config, ClientIdentity::new(NUMBER, PASSWORD), None).unwrap()
}

/// Address nothing is listening on.
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(read) => read.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Directory store that records every hand-off.
#[derive(Default)]
pub struct RecordingStore {
    pub calls: Mutex<Vec<(PathBuf, u64, u32, u64)>>,
    pub reject: bool,
}

impl RecordingStore {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, u64, u32, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DirectoryStore for RecordingStore {
    fn update(
        &self,
        snapshot: &Path,
        capacity: u64,
        hash_count: u32,
        version: u64,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((snapshot.to_path_buf(), capacity, hash_count, version));
        if self.reject {
            anyhow::bail!("store rejected snapshot");
        }
        Ok(())
    }
}
