//! Scripted HTTP server on 127.0.0.1 for browser binding tests.
//!
//! Each reply is served on its own connection (`Connection: close`) and the
//! raw request is recorded before the reply is written, so once a client
//! call returns, its request is visible through [`Loopback::requests`].

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

pub struct Reply {
    status_line: &'static str,
    body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status("HTTP/1.1 200 OK", body)
    }

    pub fn status(status_line: &'static str, body: impl Into<String>) -> Self {
        Self {
            status_line,
            body: body.into(),
        }
    }
}

pub struct Loopback {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Loopback {
    /// Serves the replies built for the server's base URL, in order. The
    /// listener closes after the last one.
    pub fn start(replies: impl FnOnce(&str) -> Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let replies = replies(&base);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        std::thread::spawn(move || {
            for reply in replies {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request(&stream);
                seen.lock().unwrap().push(request);
                let mut stream = stream;
                let _ = write!(
                    stream,
                    "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status_line,
                    reply.body.len(),
                    reply.body
                );
            }
        });

        Self { base, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Raw requests received so far: head, blank line, decoded body.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request(&self, index: usize) -> String {
        self.requests()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no request #{index} reached the server"))
    }
}

/// Service document listing one repository rooted under `base`.
pub fn service_document(base: &str) -> String {
    serde_json::json!({
        "-default-": {
            "repositoryId": "-default-",
            "repositoryName": "Main Repository",
            "rootFolderId": "root-id",
            "repositoryUrl": format!("{base}/r"),
            "rootFolderUrl": format!("{base}/r/root")
        }
    })
    .to_string()
}

fn read_request(stream: &TcpStream) -> String {
    let mut reader = BufReader::new(stream);
    let mut head = String::new();
    let mut content_length = 0usize;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap();
        }
        if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            chunked = true;
        }
        head.push_str(&line);
    }

    let mut body = Vec::new();
    if chunked {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).unwrap();
            let size_text = size_line.trim().split(';').next().unwrap_or_default();
            let size = usize::from_str_radix(size_text, 16).unwrap();
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).unwrap();
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    } else {
        body.resize(content_length, 0);
        reader.read_exact(&mut body).unwrap();
    }

    format!("{head}\r\n{}", String::from_utf8_lossy(&body))
}
