#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, Response},
};
use http_body_util::BodyExt;

use markitdown_server::config::Config;
use markitdown_server::converter::{ConversionError, Converter};
use markitdown_server::AppState;

pub const BOUNDARY: &str = "markitdown-test-boundary";

// ── Multipart bodies ─────────────────────────────────────────────────────────

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content: &'a [u8]) -> Self {
        Part {
            name: "file",
            filename: Some(filename),
            content,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, filename
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// A `/convert` request with a declared `Content-Length`.
pub fn convert_request(parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// A `/convert` request without `Content-Length`, like a chunked upload.
pub fn streamed_convert_request(parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Log capture ──────────────────────────────────────────────────────────────

/// In-memory sink for a thread-local subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route INFO and above on the current thread into a buffer until the guard drops.
pub fn capture_logs() -> (tracing::subscriber::DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}

// ── State ────────────────────────────────────────────────────────────────────

pub fn test_config(max_file_size_mb: u64) -> Config {
    Config {
        max_file_size_mb,
        workers: 2,
        request_timeout: Duration::from_secs(10),
        ..Config::default()
    }
}

pub fn state_with(converter: Arc<dyn Converter>) -> AppState {
    AppState::new(&test_config(1)).with_converter(converter)
}

// ── Fake converters ──────────────────────────────────────────────────────────

pub enum Behaviour {
    Echo,
    Fail(&'static str),
    Sleep(Duration),
}

/// Records every call so tests can assert whether conversion ran.
pub struct FakeConverter {
    behaviour: Behaviour,
    calls: AtomicUsize,
    hints: Mutex<Vec<Option<String>>>,
}

impl FakeConverter {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(FakeConverter {
            behaviour,
            calls: AtomicUsize::new(0),
            hints: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hints(&self) -> Vec<Option<String>> {
        self.hints.lock().unwrap().clone()
    }
}

impl Converter for FakeConverter {
    fn convert(&self, bytes: &[u8], extension: Option<&str>) -> Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hints
            .lock()
            .unwrap()
            .push(extension.map(str::to_string));

        match &self.behaviour {
            Behaviour::Echo => Ok(format!("# echo\n\n{}", String::from_utf8_lossy(bytes))),
            Behaviour::Fail(reason) => Err(ConversionError::Malformed {
                format: "pdf",
                reason: reason.to_string(),
            }),
            Behaviour::Sleep(duration) => {
                std::thread::sleep(*duration);
                Ok(String::new())
            }
        }
    }
}
