//! Picks the extraction strategy for an incoming request and runs it.

use reqwest::Client;
use url::Url;

use crate::{
    config::Config,
    error::AppError,
    extract::{article, docx, pdf, plain, transcript},
    models::ExtractedText,
};

/// A single, untyped piece of user input.
#[derive(Debug, Clone)]
pub enum ExtractionRequest {
    Url(String),
    File { filename: String, bytes: Vec<u8> },
    Text(String),
}

/// Upload formats we know how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
}

impl FileKind {
    /// Case-insensitive match on the filename extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }
}

/// What the resolver decided to run, with everything it needs.
#[derive(Debug, PartialEq)]
pub enum Strategy {
    VideoTranscript { video_id: String },
    WebArticle(Url),
    Pdf(Vec<u8>),
    Docx(Vec<u8>),
    PlainText(Vec<u8>),
    Passthrough(String),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::VideoTranscript { .. } => "video-transcript",
            Strategy::WebArticle(_) => "web-article",
            Strategy::Pdf(_) => "pdf",
            Strategy::Docx(_) => "docx",
            Strategy::PlainText(_) => "plain-text",
            Strategy::Passthrough(_) => "text",
        }
    }
}

/// Generic URL syntax check: http(s) scheme and a host.
pub fn parse_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw).map_err(|_| AppError::InvalidInput("Invalid URL".to_string()))?;
    let has_host = url.host_str().map_or(false, |h| !h.is_empty());
    if !matches!(url.scheme(), "http" | "https") || !has_host {
        return Err(AppError::InvalidInput("Invalid URL".to_string()));
    }
    Ok(url)
}

/// Decide which strategy applies. Performs no I/O.
pub fn plan(request: ExtractionRequest) -> Result<Strategy, AppError> {
    match request {
        ExtractionRequest::Url(raw) => {
            let url = parse_url(raw.trim())?;
            if transcript::is_video_url(&url) {
                let video_id = transcript::video_id(&url)
                    .ok_or_else(|| AppError::InvalidInput("Invalid YouTube URL".to_string()))?;
                Ok(Strategy::VideoTranscript { video_id })
            } else {
                Ok(Strategy::WebArticle(url))
            }
        }
        ExtractionRequest::File { filename, bytes } => match FileKind::from_filename(&filename) {
            Some(FileKind::Pdf) => Ok(Strategy::Pdf(bytes)),
            Some(FileKind::Docx) => Ok(Strategy::Docx(bytes)),
            Some(FileKind::Txt) => Ok(Strategy::PlainText(bytes)),
            None => Err(AppError::UnsupportedMediaType(
                "Unsupported file type".to_string(),
            )),
        },
        ExtractionRequest::Text(text) => Ok(Strategy::Passthrough(text)),
    }
}

/// Holds the outbound client; cheap to share across requests.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: Client,
    youtube_base: Url,
}

impl Resolver {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: crate::extract::http_client(config)?,
            youtube_base: config.youtube_base_url.clone(),
        })
    }

    pub async fn resolve(&self, request: ExtractionRequest) -> Result<ExtractedText, AppError> {
        let strategy = plan(request)?;
        let name = strategy.name();

        let content = match strategy {
            Strategy::VideoTranscript { video_id } => {
                transcript::extract_transcript(&self.client, &self.youtube_base, &video_id).await
            }
            Strategy::WebArticle(url) => article::extract_article(&self.client, &url).await,
            Strategy::Pdf(bytes) => run_blocking(move || pdf::extract_pdf(&bytes)).await,
            Strategy::Docx(bytes) => run_blocking(move || docx::extract_docx(&bytes)).await,
            Strategy::PlainText(bytes) => plain::extract_plain(bytes),
            Strategy::Passthrough(text) => Ok(text),
        }
        .map_err(|e| {
            tracing::warn!(strategy = name, error = ?e, "extraction failed");
            e
        })?;

        tracing::debug!(strategy = name, chars = content.len(), "extracted content");
        Ok(ExtractedText { content })
    }
}

async fn run_blocking<F>(f: F) -> Result<String, AppError>
where
    F: FnOnce() -> Result<String, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("decode task failed: {}", e)))?
}
