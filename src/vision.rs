//! Vision model abstraction.
//!
//! Defines the [`VisionModel`] trait so the W-2 pipeline can run against the
//! OpenRouter client in production and a canned reply in tests.

/// An uploaded image (or single-page PDF) to be transcribed.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageInput {
    /// Build an input, trusting `content_type` only when it names an image or PDF.
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, data: Vec<u8>) -> Self {
        let mime_type = match content_type {
            Some(ct) if ct.starts_with("image/") || ct == "application/pdf" => ct.to_string(),
            _ => sniff_mime_type(&data).to_string(),
        };
        Self {
            filename: filename.into(),
            mime_type,
            data,
        }
    }
}

/// Async trait implemented by each model backend.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Send `prompt` together with `image` and return the raw reply text.
    async fn transcribe(&self, prompt: &str, image: &ImageInput) -> anyhow::Result<String>;
}

/// Guess a MIME type from magic bytes, defaulting to JPEG.
pub fn sniff_mime_type(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'%', b'P', b'D', b'F', ..] => "application/pdf",
        _ => "image/jpeg",
    }
}
