use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::domain::{AdminError, Message};
use crate::navigation::ViewId;

pub const EAD_COLLECTION: &str = "/ead";
pub const ARCHIVE_COLLECTION: &str = "/lists/archives";

/// One backend request, queued by the model and executed off the main thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    FetchPage {
        view: ViewId,
        url: String,
        query: Vec<(String, String)>,
        echo: u64,
    },
    DeleteEad {
        id: String,
    },
    UploadEad {
        path: PathBuf,
    },
    ListArchives {
        echo: u64,
    },
    SaveArchive {
        id: Option<String>,
        fields: Vec<(String, String)>,
    },
    DeleteArchive {
        id: String,
    },
}

impl ApiCall {
    pub fn method(&self) -> &'static str {
        match self {
            ApiCall::FetchPage { .. } | ApiCall::ListArchives { .. } => "GET",
            ApiCall::DeleteEad { .. } | ApiCall::DeleteArchive { .. } => "DELETE",
            ApiCall::UploadEad { .. } => "POST",
            ApiCall::SaveArchive { id: Some(_), .. } => "PUT",
            ApiCall::SaveArchive { id: None, .. } => "POST",
        }
    }

    pub fn path(&self) -> String {
        match self {
            ApiCall::FetchPage { url, .. } => url.clone(),
            ApiCall::DeleteEad { id } => format!("{EAD_COLLECTION}/{id}"),
            ApiCall::UploadEad { .. } => EAD_COLLECTION.to_string(),
            ApiCall::ListArchives { .. } | ApiCall::SaveArchive { id: None, .. } => {
                ARCHIVE_COLLECTION.to_string()
            }
            ApiCall::SaveArchive { id: Some(id), .. } | ApiCall::DeleteArchive { id } => {
                format!("{ARCHIVE_COLLECTION}/{id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// The request never produced an HTTP response.
    Transport(String),
    /// The backend answered with a non-success status.
    Rejected { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    description: String,
}

impl ApiFailure {
    /// Joins every `errors[].description` with `separator`. A body that is
    /// not an error envelope is shown verbatim.
    pub fn describe(&self, separator: &str) -> String {
        match self {
            ApiFailure::Transport(message) => message.clone(),
            ApiFailure::Rejected { status, body } => {
                match serde_json::from_str::<ErrorEnvelope>(body) {
                    Ok(envelope) => envelope
                        .errors
                        .into_iter()
                        .map(|e| e.description)
                        .collect::<Vec<String>>()
                        .join(separator),
                    Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
                    Err(_) => body.clone(),
                }
            }
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe("; "))
    }
}

#[derive(Debug, Clone)]
pub struct ApiReply {
    pub call: ApiCall,
    pub outcome: Result<Value, ApiFailure>,
}

pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

pub trait Backend: Send + Sync + 'static {
    fn execute(&self, call: &ApiCall, progress: ProgressFn) -> Result<Value, ApiFailure>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AdminError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, call: &ApiCall, progress: ProgressFn) -> Result<RequestBuilder, ApiFailure> {
        let url = self.url(&call.path());
        let builder = match call {
            ApiCall::FetchPage { query, .. } => self.client.get(url).query(query),
            ApiCall::ListArchives { .. } => self.client.get(url),
            ApiCall::DeleteEad { .. } | ApiCall::DeleteArchive { .. } => self.client.delete(url),
            ApiCall::SaveArchive { id: Some(_), fields } => self.client.put(url).form(fields),
            ApiCall::SaveArchive { id: None, fields } => self.client.post(url).form(fields),
            ApiCall::UploadEad { path } => self.client.post(url).multipart(upload_form(path, progress)?),
        };
        Ok(builder.header(reqwest::header::ACCEPT, "application/json"))
    }
}

impl Backend for HttpBackend {
    fn execute(&self, call: &ApiCall, progress: ProgressFn) -> Result<Value, ApiFailure> {
        trace!("{} {}", call.method(), call.path());
        let response = self
            .request(call, progress)?
            .send()
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ApiFailure::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        decode_body(&body)
    }
}

pub(crate) fn decode_body(body: &str) -> Result<Value, ApiFailure> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiFailure::Transport(format!("invalid json: {e}")))
}

fn upload_form(path: &Path, progress: ProgressFn) -> Result<Form, ApiFailure> {
    let file = File::open(path)
        .map_err(|e| ApiFailure::Transport(format!("{}: {e}", path.display())))?;
    let total = file
        .metadata()
        .map_err(|e| ApiFailure::Transport(e.to_string()))?
        .len();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload.xml")
        .to_string();
    let reader = ProgressReader {
        inner: file,
        sent: 0,
        total,
        progress,
    };
    let part = Part::reader_with_length(reader, total).file_name(file_name);
    Ok(Form::new().part("file", part))
}

/// Reports the number of bytes handed to the transport so far.
struct ProgressReader<R> {
    inner: R,
    sent: u64,
    total: u64,
    progress: ProgressFn,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            (self.progress)(self.sent, self.total);
        }
        Ok(n)
    }
}

/// Runs each call on its own worker thread and posts the completion back
/// to the event loop. In flight calls are never cancelled.
pub struct Dispatcher<B: Backend> {
    backend: Arc<B>,
    replies: Sender<Message>,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B, replies: Sender<Message>) -> Self {
        Self {
            backend: Arc::new(backend),
            replies,
        }
    }

    pub fn dispatch(&self, call: ApiCall) {
        debug!("Dispatching {} {}", call.method(), call.path());
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();
        let progress_tx = self.replies.clone();
        let progress: ProgressFn = Arc::new(move |sent, total| {
            let _ = progress_tx.send(Message::UploadProgress { sent, total });
        });
        thread::spawn(move || {
            let outcome = backend.execute(&call, progress);
            if let Err(e) = &outcome {
                debug!("{} {} failed: {e}", call.method(), call.path());
            }
            if replies.send(Message::Reply(ApiReply { call, outcome })).is_err() {
                error!("Event loop is gone, dropping reply");
            }
        });
    }
}
