//! A scripted HTTP server for exercising the generation client end to end.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

pub type CapturedRequests = Arc<Mutex<Vec<CapturedRequest>>>;

/// One scripted reply. Bodies are streamed piece by piece with a short pause
/// between writes so the client sees them as separate reads.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status_line: String,
    extra_headers: Vec<String>,
    pieces: Vec<String>,
    empty_body: bool,
    declared_length: Option<usize>,
    hold_open: bool,
}

impl MockResponse {
    pub fn ndjson(pieces: Vec<String>) -> Self {
        Self {
            status_line: "200 OK".to_string(),
            extra_headers: vec!["Content-Type: application/x-ndjson".to_string()],
            pieces,
            empty_body: false,
            declared_length: None,
            hold_open: false,
        }
    }

    /// A bare status reply with no body.
    pub fn status(status_line: &str) -> Self {
        Self {
            status_line: status_line.to_string(),
            extra_headers: Vec::new(),
            pieces: Vec::new(),
            empty_body: true,
            declared_length: None,
            hold_open: false,
        }
    }

    /// `200 OK` with `Content-Length: 0`.
    pub fn empty() -> Self {
        Self::status("200 OK")
    }

    /// NDJSON reply that announces `declared_length` body bytes but closes
    /// the connection after sending only `pieces`.
    pub fn truncated(pieces: Vec<String>, declared_length: usize) -> Self {
        Self {
            declared_length: Some(declared_length),
            ..Self::ndjson(pieces)
        }
    }

    pub fn with_header(mut self, header: &str) -> Self {
        self.extra_headers.push(header.to_string());
        self
    }

    /// Keep the connection open after the last piece instead of closing it.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    async fn write_to(&self, stream: &mut TcpStream) -> std::io::Result<()> {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status_line);
        for header in &self.extra_headers {
            head.push_str(header);
            head.push_str("\r\n");
        }
        if self.empty_body {
            head.push_str("Content-Length: 0\r\n\r\n");
            stream.write_all(head.as_bytes()).await?;
            return stream.flush().await;
        }

        if let Some(length) = self.declared_length {
            head.push_str(&format!("Content-Length: {length}\r\n"));
        }
        head.push_str("Connection: close\r\n\r\n");
        stream.write_all(head.as_bytes()).await?;
        stream.flush().await?;

        for piece in &self.pieces {
            stream.write_all(piece.as_bytes()).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        if self.hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        stream.shutdown().await
    }
}

pub struct MockServer {
    pub base_url: String,
    pub requests: CapturedRequests,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Serve `responses` in order, one per connection.
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let requests: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    if let Ok(request) = read_http_request(&mut stream).await {
                        captured.lock().await.push(request);
                    }
                    let _ = response.write_to(&mut stream).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}/api/"),
            requests,
            task,
        }
    }

    pub async fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A client that talks to the mock directly, ignoring proxy variables.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("test client should build")
}

/// Base URL pointing at a local port nothing listens on.
pub async fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}/api/")
}

pub fn ndjson_line(record: &str) -> String {
    format!("{record}\n")
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.ok_or_else(|| "Missing header terminator".to_string())?;
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
