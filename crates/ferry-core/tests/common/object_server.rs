//! Minimal HTTP/1.1 server for integration tests: a source host plus a tiny
//! object store.
//!
//! `GET /src/<name>` serves a registered source body (404 if unknown, 500 for
//! names registered as broken). `HEAD` / `PUT /<bucket>/<key>` behave like an
//! object store: HEAD is 200 or 404, PUT stores the body and returns an ETag
//! (or 412 when `If-None-Match: *` is sent and the key already exists).
//! When a token is set, store requests without `Authorization: Bearer <token>`
//! get 403.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct State {
    sources: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    objects: HashMap<String, Vec<u8>>,
    put_headers: HashMap<String, Vec<(String, String)>>,
    gets: Vec<String>,
}

#[derive(Clone)]
pub struct ObjectServer {
    base: String,
    bucket: String,
    token: Option<String>,
    state: Arc<Mutex<State>>,
}

impl ObjectServer {
    /// Starts the server in a background thread. It runs until the process exits.
    pub fn start(bucket: &str, token: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server = Self {
            base: format!("http://127.0.0.1:{}/", port),
            bucket: bucket.to_string(),
            token: token.map(str::to_string),
            state: Arc::new(Mutex::new(State::default())),
        };
        let srv = server.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let srv = srv.clone();
                thread::spawn(move || srv.handle(stream));
            }
        });
        server
    }

    /// Base URL, e.g. "http://127.0.0.1:12345/".
    pub fn endpoint(&self) -> &str {
        &self.base
    }

    pub fn add_source(&self, name: &str, body: Vec<u8>) -> String {
        let mut state = self.state.lock().unwrap();
        state.broken.remove(name);
        state.sources.insert(name.to_string(), body);
        drop(state);
        format!("{}src/{}", self.base, name)
    }

    pub fn add_broken_source(&self, name: &str) -> String {
        self.state.lock().unwrap().broken.insert(name.to_string());
        format!("{}src/{}", self.base, name)
    }

    pub fn put_object(&self, key: &str, body: Vec<u8>) {
        self.state.lock().unwrap().objects.insert(key.to_string(), body);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    /// Request header (lowercased name) sent with the PUT of `key`.
    pub fn put_header(&self, key: &str, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .put_headers
            .get(key)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Source names fetched so far, in request order.
    pub fn gets(&self) -> Vec<String> {
        self.state.lock().unwrap().gets.clone()
    }

    fn handle(&self, mut stream: TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
        let Some(req) = read_request(&mut stream) else {
            return;
        };
        let path = req.path.trim_start_matches('/').to_string();

        if let Some(name) = path.strip_prefix("src/") {
            if !req.method.eq_ignore_ascii_case("GET") {
                respond(&mut stream, "405 Method Not Allowed", &[], b"");
                return;
            }
            let mut state = self.state.lock().unwrap();
            state.gets.push(name.to_string());
            if state.broken.contains(name) {
                drop(state);
                respond(&mut stream, "500 Internal Server Error", &[], b"");
                return;
            }
            let body = state.sources.get(name).cloned();
            drop(state);
            match body {
                Some(body) => respond(&mut stream, "200 OK", &[], &body),
                None => respond(&mut stream, "404 Not Found", &[], b""),
            }
            return;
        }

        let Some(key) = path
            .strip_prefix(&self.bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(percent_decode)
        else {
            respond(&mut stream, "404 Not Found", &[], b"");
            return;
        };
        if let Some(token) = &self.token {
            let expected = format!("Bearer {}", token);
            if req.header("authorization") != Some(expected.as_str()) {
                respond(&mut stream, "403 Forbidden", &[], b"");
                return;
            }
        }

        if req.method.eq_ignore_ascii_case("HEAD") {
            let len = self.state.lock().unwrap().objects.get(&key).map(Vec::len);
            match len {
                Some(len) => {
                    let cl = format!("Content-Length: {}", len);
                    respond_head(&mut stream, "200 OK", &[cl.as_str()]);
                }
                None => respond_head(&mut stream, "404 Not Found", &[]),
            }
        } else if req.method.eq_ignore_ascii_case("PUT") {
            let create_only = req.header("if-none-match") == Some("*");
            if create_only && self.state.lock().unwrap().objects.contains_key(&key) {
                respond(&mut stream, "412 Precondition Failed", &[], b"");
                return;
            }
            let etag = format!("ETag: \"{:x}\"", req.body.len());
            let mut state = self.state.lock().unwrap();
            state.objects.insert(key.clone(), req.body);
            state.put_headers.insert(key, req.headers);
            drop(state);
            respond(&mut stream, "200 OK", &[etag.as_str()], b"");
        } else {
            respond(&mut stream, "405 Method Not Allowed", &[], b"");
        }
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };
    let head = std::str::from_utf8(&data[..header_end]).ok()?;
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(v) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[&str], body: &[u8]) {
    let mut response = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\n", status, body.len());
    for h in headers {
        response.push_str(h);
        response.push_str("\r\n");
    }
    response.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
}

// HEAD responses carry headers only.
fn respond_head(stream: &mut TcpStream, status: &str, headers: &[&str]) {
    let mut response = format!("HTTP/1.1 {}\r\n", status);
    for h in headers {
        response.push_str(h);
        response.push_str("\r\n");
    }
    if headers.is_empty() {
        response.push_str("Content-Length: 0\r\n");
    }
    response.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(response.as_bytes());
}
