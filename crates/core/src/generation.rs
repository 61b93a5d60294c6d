//! Generation request model and validation rules.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Clip duration accepted by the generation service, in seconds.
///
/// Serializes as the number of seconds; deserialization also accepts
/// the string forms `"5"` / `"10"` for callers that quote the value.
/// Anything outside the enum is a deserialization error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipDuration {
    Five,
    Ten,
}

impl ClipDuration {
    /// Duration in whole seconds.
    pub fn secs(self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
        }
    }
}

impl Serialize for ClipDuration {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.secs())
    }
}

impl<'de> Deserialize<'de> for ClipDuration {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let secs = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid duration '{s}'")))?,
        };
        match secs {
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            other => Err(serde::de::Error::custom(format!(
                "duration must be 5 or 10 seconds, got {other}"
            ))),
        }
    }
}

/// Output resolution accepted by the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "720p")]
    R720p,
}

impl Resolution {
    /// Wire/filename label (`"480p"` / `"720p"`).
    pub fn label(self) -> &'static str {
        match self {
            Self::R480p => "480p",
            Self::R720p => "720p",
        }
    }
}

/// A request to generate one video clip.
///
/// `image_url` switches the request into image-conditioned mode; when
/// absent the prompt alone drives generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub duration: ClipDuration,
    pub resolution: Resolution,
    #[serde(default)]
    pub camera_fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl GenerationRequest {
    /// Whether this request conditions generation on a source image.
    pub fn is_image_conditioned(&self) -> bool {
        self.image_url.is_some()
    }
}

/// Validate a [`GenerationRequest`] before it enters the queue.
///
/// Rules:
/// - The prompt, after trimming, must not be empty.
/// - The prompt must not exceed [`MAX_PROMPT_CHARS`] characters.
/// - When an `image_url` is supplied it must not be blank.
///
/// Duration and resolution are closed enums, so out-of-range values are
/// rejected during deserialization before this function runs.
pub fn validate_request(request: &GenerationRequest) -> Result<(), CoreError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".into()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "Prompt must not exceed {MAX_PROMPT_CHARS} characters"
        )));
    }
    if let Some(url) = &request.image_url {
        if url.trim().is_empty() {
            return Err(CoreError::Validation(
                "image_url must not be blank when provided".into(),
            ));
        }
    }
    Ok(())
}

/// Derive a display title from a prompt (first 60 characters, trimmed).
pub fn title_from_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    let title: String = trimmed.chars().take(60).collect();
    if trimmed.chars().count() > 60 {
        format!("{title}...")
    } else {
        title
    }
}
