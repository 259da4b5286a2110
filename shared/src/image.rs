use std::borrow::Cow;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Raster bytes as they cross a JSON boundary: `{"type":"Buffer","data":[..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Buffer")]
pub struct BinaryImage {
    pub data: Vec<u8>,
}

/// An image field on a map record.
///
/// The backend hands images out as `data:` URIs, renderers sometimes send
/// bare base64, and records being written back carry raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImagePayload {
    Text(String),
    Binary(BinaryImage),
}

impl ImagePayload {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(BinaryImage { data: data.into() })
    }

    pub fn is_data_uri(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with("data:"))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => base64_body(text).is_empty(),
            Self::Binary(binary) => binary.data.is_empty(),
        }
    }

    /// Base64 body of the payload with any `data:...;base64,` prefix removed.
    pub fn base64(&self) -> Option<Cow<'_, str>> {
        let body = match self {
            Self::Text(text) => Cow::Borrowed(base64_body(text)),
            Self::Binary(binary) => Cow::Owned(STANDARD.encode(&binary.data)),
        };
        (!body.is_empty()).then_some(body)
    }

    /// Inline form suitable for an `<img src>`.
    ///
    /// Existing data URIs pass through untouched; everything else is wrapped
    /// as `data:image/<ext>;base64,..` with `<ext>` taken from `display_name`.
    pub fn to_data_url(&self, display_name: &str) -> Option<String> {
        if let Self::Text(text) = self
            && text.starts_with("data:")
        {
            return Some(text.clone());
        }
        let body = self.base64()?;
        Some(format!(
            "data:image/{};base64,{body}",
            image_extension(display_name)
        ))
    }

    /// Decodes textual payloads back to raw bytes.
    pub fn to_binary(&self) -> Result<Self, base64::DecodeError> {
        match self {
            Self::Binary(_) => Ok(self.clone()),
            Self::Text(text) => STANDARD.decode(base64_body(text)).map(Self::from_bytes),
        }
    }

    /// Drops the data URI prefix, keeping bare base64.
    pub fn strip_data_uri(&mut self) {
        if let Self::Text(text) = self
            && text.starts_with("data:")
            && let Some((_, body)) = text.split_once(',')
        {
            *text = body.to_string();
        }
    }
}

/// Extension of a display name such as `town.png`, defaulting to `png`.
pub fn image_extension(display_name: &str) -> &str {
    Path::new(display_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_IMAGE_EXTENSION)
}

fn base64_body(text: &str) -> &str {
    if text.starts_with("data:") {
        text.split_once(',').map_or("", |(_, body)| body)
    } else {
        text
    }
}
