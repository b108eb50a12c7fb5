//! Minimal HTTP/1.1 server speaking just enough S3 and broker API for
//! integration tests.
//!
//! Serves one object at `/{bucket}/{key}`: HEAD answers with Content-Length,
//! ranged GET answers 206, a GET for any other key gets a 404 error document.
//! Optionally demands an SSE-C key and injects faults. The broker endpoints
//! answer fixed JSON documents.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// S3-style error document sent with a GET for an unknown key.
const NO_SUCH_KEY: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>\
<Key>missing</Key><RequestId>4442587FB7D0A2F9</RequestId></Error>";

#[derive(Debug, Clone, Default)]
pub struct ObjectFixture {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    /// Base64 SSE-C key every request must carry.
    pub sse_key: Option<String>,
    /// Ranges starting at this offset come back with half their bytes.
    pub short_range_at: Option<u64>,
    /// Answer GET with 200 and the whole body, ignoring Range.
    pub ignore_range: bool,
}

impl ObjectFixture {
    pub fn new(bucket: &str, key: &str, body: Vec<u8>) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrokerFixture {
    /// Short code accepted by `downloadCredentials`.
    pub short_url: String,
    /// JSON returned for the accepted short code.
    pub credentials: String,
    pub username: String,
    pub password: String,
    /// JSON returned by `listTransfers` for the accepted account.
    pub transfers: String,
}

#[derive(Debug, Default)]
struct Fixtures {
    object: Option<ObjectFixture>,
    broker: Option<BrokerFixture>,
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
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve `object`. Returns the endpoint as `127.0.0.1:PORT` (no scheme).
pub fn start_object(object: ObjectFixture) -> String {
    start(Fixtures {
        object: Some(object),
        broker: None,
    })
}

/// Serve the broker API. Returns the base URL (`http://127.0.0.1:PORT/`).
pub fn start_broker(broker: BrokerFixture) -> String {
    let addr = start(Fixtures {
        object: None,
        broker: Some(broker),
    });
    format!("http://{}/", addr)
}

fn start(fixtures: Fixtures) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let fixtures = Arc::new(fixtures);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let fixtures = Arc::clone(&fixtures);
            thread::spawn(move || handle(stream, &fixtures));
        }
    });
    format!("127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, fixtures: &Fixtures) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let request = match read_request(&stream) {
        Some(r) => r,
        None => return,
    };

    if request.method.eq_ignore_ascii_case("POST") {
        match &fixtures.broker {
            Some(broker) => serve_broker(&mut stream, broker, &request),
            None => respond(&mut stream, "404 Not Found", &[], b""),
        }
        return;
    }
    match &fixtures.object {
        Some(object) => serve_object(&mut stream, object, &request),
        None => respond(&mut stream, "404 Not Found", &[], b""),
    }
}

fn serve_object(stream: &mut TcpStream, object: &ObjectFixture, request: &Request) {
    let expected_path = format!("/{}/{}", object.bucket, object.key);
    if request.path != expected_path {
        if request.method.eq_ignore_ascii_case("GET") {
            let xml = [("Content-Type", "application/xml")];
            respond(stream, "404 Not Found", &xml, NO_SUCH_KEY.as_bytes());
        } else {
            respond(stream, "404 Not Found", &[], b"");
        }
        return;
    }
    if let Some(key) = &object.sse_key {
        let algorithm = request.header("x-amz-server-side-encryption-customer-algorithm");
        let sent = request.header("x-amz-server-side-encryption-customer-key");
        let md5 = request.header("x-amz-server-side-encryption-customer-key-MD5");
        if algorithm != Some("AES256") || sent != Some(key.as_str()) || md5.is_none() {
            respond(stream, "400 Bad Request", &[], b"");
            return;
        }
    }

    let body = &object.body;
    let total = body.len() as u64;
    if request.method.eq_ignore_ascii_case("HEAD") {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nETag: \"fixture\"\r\nConnection: close\r\n\r\n",
            total
        );
        let _ = stream.write_all(head.as_bytes());
        return;
    }
    if !request.method.eq_ignore_ascii_case("GET") {
        respond(stream, "405 Method Not Allowed", &[], b"");
        return;
    }

    let range = request.header("range").and_then(parse_range);
    match range {
        Some((start, end_incl)) if !object.ignore_range => {
            if start >= total || start > end_incl {
                let cr = format!("bytes */{}", total);
                respond(stream, "416 Range Not Satisfiable", &[("Content-Range", cr.as_str())], b"");
                return;
            }
            let end_excl = (end_incl + 1).min(total);
            let mut slice = &body[start as usize..end_excl as usize];
            if object.short_range_at == Some(start) {
                slice = &slice[..slice.len() / 2];
            }
            let cr = format!("bytes {}-{}/{}", start, end_excl - 1, total);
            respond(stream, "206 Partial Content", &[("Content-Range", cr.as_str())], slice);
        }
        _ => respond(stream, "200 OK", &[], body),
    }
}

fn serve_broker(stream: &mut TcpStream, broker: &BrokerFixture, request: &Request) {
    let json: serde_json::Value = match serde_json::from_slice(&request.body) {
        Ok(v) => v,
        Err(_) => {
            respond(stream, "400 Bad Request", &[], b"");
            return;
        }
    };
    let json_type = [("Content-Type", "application/json")];
    match request.path.as_str() {
        "/downloadCredentials" => {
            if json["shorturl"] == broker.short_url.as_str() {
                respond(stream, "200 OK", &json_type, broker.credentials.as_bytes());
            } else {
                respond(stream, "400 Bad Request", &[], b"");
            }
        }
        "/listTransfers" => {
            if json["username"] == broker.username.as_str()
                && json["password"] == broker.password.as_str()
            {
                respond(stream, "200 OK", &json_type, broker.transfers.as_bytes());
            } else {
                respond(stream, "401 Unauthorized", &[], b"");
            }
        }
        _ => respond(stream, "404 Not Found", &[], b""),
    }
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, &str)], body: &[u8]) {
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut request = Request {
        method,
        path,
        headers,
        body: Vec::new(),
    };
    let length = request
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if length > 0 {
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).ok()?;
        request.body = body;
    }
    Some(request)
}

/// `bytes=X-Y` to `(X, Y)`; open-ended ranges run to the end of the object.
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (a, b) = spec.split_once('-')?;
    let start = a.trim().parse::<u64>().ok()?;
    let end = match b.trim() {
        "" => u64::MAX,
        b => b.parse::<u64>().ok()?,
    };
    Some((start, end))
}
