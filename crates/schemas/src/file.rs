// File payloads
//
// Binary artifacts produced by an agent turn (charts, generated images, ...).
// Bytes travel as base64 in JSON so recorded streams stay plain text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Fetched content of a file referenced by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

impl FileContent {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            name: None,
            media_type: None,
            data,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True when the media type or the file extension says image
    pub fn is_image(&self) -> bool {
        if let Some(media_type) = &self.media_type {
            return media_type.starts_with("image/");
        }
        self.name
            .as_deref()
            .map(has_image_extension)
            .unwrap_or(false)
    }

    /// Extract file name from a path
    pub fn name_from_path(path: &str) -> String {
        path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path).to_string()
    }
}

/// Check a path or file name for a well-known image extension
pub fn has_image_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(data))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    BASE64.decode(encoded).map_err(serde::de::Error::custom)
}
