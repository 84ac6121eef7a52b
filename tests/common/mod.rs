#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;

use acmekit::crypto::base64url_decode;
use serde_json::{Value, json};

/// Mock ACME server over mockito, for exchanges where every path is hit
/// with one fixed response.
pub struct MockAcmeServer {
    pub server: mockito::ServerGuard,
}

impl MockAcmeServer {
    pub fn new() -> Self {
        Self {
            server: mockito::Server::new(),
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn directory_url(&self) -> String {
        format!("{}/directory", self.url())
    }

    /// Serve the directory with an `Expires` far in the future so the
    /// session fetches it exactly once.
    pub fn mock_directory(&mut self) -> mockito::Mock {
        let url = self.url();
        self.server
            .mock("GET", "/directory")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("expires", "Fri, 01 Jan 2038 00:00:00 GMT")
            .with_body(
                json!({
                    "newNonce": format!("{url}/new-nonce"),
                    "newAccount": format!("{url}/new-account"),
                    "newOrder": format!("{url}/new-order"),
                    "revokeCert": format!("{url}/revoke-cert"),
                    "keyChange": format!("{url}/key-change"),
                    "meta": {
                        "termsOfService": "https://ca.example/tos",
                        "website": "https://ca.example",
                        "caaIdentities": ["ca.example"]
                    }
                })
                .to_string(),
            )
            .create()
    }

    pub fn mock_new_nonce(&mut self) -> mockito::Mock {
        self.server
            .mock("HEAD", "/new-nonce")
            .with_status(200)
            .with_header("replay-nonce", "mock-nonce-1")
            .create()
    }

    pub fn mock_new_account(&mut self) -> mockito::Mock {
        let url = self.url();
        self.server
            .mock("POST", "/new-account")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_header("replay-nonce", "mock-nonce-2")
            .with_header("location", &format!("{url}/account/1"))
            .with_body(
                json!({
                    "status": "valid",
                    "contact": ["mailto:admin@example.com"],
                    "orders": format!("{url}/account/1/orders")
                })
                .to_string(),
            )
            .create()
    }
}

/// One response of a [`ScriptedServer`]
pub struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ScriptedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn nonce(self, nonce: &str) -> Self {
        self.header("Replay-Nonce", nonce)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = body.to_string().into_bytes();
        self.header("Content-Type", "application/json")
    }

    pub fn problem(mut self, body: Value) -> Self {
        self.body = body.to_string().into_bytes();
        self.header("Content-Type", "application/problem+json")
    }

    pub fn pem_body(mut self, body: String) -> Self {
        self.body = body.into_bytes();
        self.header("Content-Type", "application/pem-certificate-chain")
    }
}

/// One request recorded by a [`ScriptedServer`]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The request body as JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    /// The decoded protected header of a JWS request body
    pub fn protected(&self) -> Value {
        let jws = self.json();
        let encoded = jws["protected"].as_str().expect("JWS has a protected header");
        serde_json::from_slice(&base64url_decode(encoded).unwrap()).unwrap()
    }

    /// The decoded payload of a JWS request body; `None` for POST-as-GET
    pub fn payload(&self) -> Option<Value> {
        let jws = self.json();
        let encoded = jws["payload"].as_str().expect("JWS has a payload");
        if encoded.is_empty() {
            return None;
        }
        Some(serde_json::from_slice(&base64url_decode(encoded).unwrap()).unwrap())
    }
}

/// A minimal HTTP server that answers a fixed sequence of responses and
/// records every request. Used where responses to the same URL must
/// change between requests (bad-nonce replay, polling, conditional GET),
/// which a per-route mock cannot express.
pub struct ScriptedServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<RecordedRequest>>,
}

impl ScriptedServer {
    /// Start a server whose base URL is passed to the response builder
    pub fn start(build: impl FnOnce(&str) -> Vec<ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().unwrap();
        let responses = build(&format!("http://{addr}"));
        let handle = std::thread::spawn(move || {
            let mut records = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accept connection");
                let request = read_request(&mut stream);
                let head_request = request.method == "HEAD";
                records.push(request);
                write_response(&mut stream, &response, head_request);
            }
            records
        });
        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Wait until all scripted responses were served and return the
    /// recorded requests
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().expect("test server thread")
    }
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().expect("method").to_owned();
    let path = parts.next().expect("path").to_owned();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).expect("request body");

    RecordedRequest {
        method,
        path,
        headers,
        body,
    }
}

fn write_response(stream: &mut TcpStream, response: &ScriptedResponse, head_request: bool) {
    let mut out = format!("HTTP/1.1 {} ACME\r\n", response.status);
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    out.push_str("Connection: close\r\n\r\n");
    stream.write_all(out.as_bytes()).expect("write response head");
    if !head_request {
        stream.write_all(&response.body).expect("write response body");
    }
    let _ = stream.flush();
}

/// A directory document for a scripted server listening on `base`
pub fn directory_body(base: &str) -> Value {
    json!({
        "newNonce": format!("{base}/new-nonce"),
        "newAccount": format!("{base}/new-account"),
        "newOrder": format!("{base}/new-order"),
        "revokeCert": format!("{base}/revoke-cert"),
        "keyChange": format!("{base}/key-change"),
        "meta": {
            "termsOfService": "https://ca.example/tos"
        }
    })
}

/// A scripted 200 directory response that never expires, so the session
/// fetches the directory exactly once
pub fn directory_response(base: &str) -> ScriptedResponse {
    ScriptedResponse::new(200)
        .header("Expires", "Fri, 01 Jan 2038 00:00:00 GMT")
        .json(directory_body(base))
}
