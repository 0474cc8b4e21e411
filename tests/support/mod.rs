#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One request as seen by the test server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub range: Option<(u64, u64)>,
    pub status: u16,
}

/// A minimal in-process HTTP server for a single byte blob.
///
/// Answers `HEAD /data` with the blob's length and `GET /data` with exact
/// `Range: bytes=a-b` slices; everything else is a 404. Every request is
/// recorded so tests can assert how many GETs were issued and with which
/// ranges.
pub struct RangeServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl RangeServer {
    pub fn serve(body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let body = Arc::new(body);
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let body = Arc::clone(&body);
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, &body, &log));
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/data", self.addr)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Successful GETs, in arrival order.
    pub fn get_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == "GET" && r.status < 400)
            .count()
    }

    /// Ranges of successful GETs, in arrival order.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.requests()
            .iter()
            .filter(|r| r.method == "GET" && r.status < 400)
            .filter_map(|r| r.range)
            .collect()
    }

    /// Requests that were answered with an error status.
    pub fn failures(&self) -> Vec<Request> {
        self.requests()
            .iter()
            .filter(|r| r.status >= 400)
            .cloned()
            .collect()
    }
}

fn handle(mut stream: TcpStream, body: &[u8], log: &Mutex<Vec<Request>>) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    if method.is_empty() || path.is_empty() {
        return;
    }

    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("range:") {
            range = parse_range(value.trim());
        }
    }

    let (status, response_body, content_range) = if path != "/data" {
        (404, b"not found".to_vec(), None)
    } else if method == "GET" {
        match range {
            Some((start, end)) if (start as usize) < body.len() && start <= end => {
                let end = (end as usize).min(body.len() - 1);
                (
                    206,
                    body[start as usize..=end].to_vec(),
                    Some(format!("bytes {start}-{end}/{}", body.len())),
                )
            }
            Some(_) => (416, Vec::new(), None),
            None => (200, body.to_vec(), None),
        }
    } else {
        (200, body.to_vec(), None)
    };

    log.lock().unwrap().push(Request {
        method: method.clone(),
        path,
        range,
        status,
    });

    let reason = match status {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        _ => "Range Not Satisfiable",
    };
    let mut response = format!("HTTP/1.1 {status} {reason}\r\n");
    response.push_str(&format!("Content-Length: {}\r\n", response_body.len()));
    if let Some(content_range) = content_range {
        response.push_str(&format!("Content-Range: {content_range}\r\n"));
    }
    response.push_str("Accept-Ranges: bytes\r\nConnection: close\r\n\r\n");

    let _ = stream.write_all(response.as_bytes());
    if method != "HEAD" {
        let _ = stream.write_all(&response_body);
    }
    let _ = stream.flush();
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}
