//! Generation request enums, input validation, and lifecycle rules.
//!
//! A generation moves `pending -> completed | failed` exactly once. The
//! rules here are pure; the record store applies them atomically and the
//! API layer orchestrates them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Length bounds
// ---------------------------------------------------------------------------

/// Default shortest allowed video length in seconds.
pub const DEFAULT_MIN_LENGTH_SECS: i32 = 10;
/// Default longest allowed video length in seconds.
pub const DEFAULT_MAX_LENGTH_SECS: i32 = 15;

/// Message shown when a failed record carries no error text.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed.";
/// Message shown when a watched identifier does not resolve to a record.
pub const UNKNOWN_GENERATION_MESSAGE: &str = "Could not find this generation.";

/// Inclusive bounds on the requested video length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounds {
    pub min_secs: i32,
    pub max_secs: i32,
}

impl LengthBounds {
    /// Build bounds, rejecting empty or non-positive ranges.
    pub fn new(min_secs: i32, max_secs: i32) -> Result<Self, CoreError> {
        if min_secs <= 0 || max_secs < min_secs {
            return Err(CoreError::Validation(format!(
                "Invalid length bounds {min_secs}..={max_secs}"
            )));
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn contains(&self, secs: i64) -> bool {
        secs >= i64::from(self.min_secs) && secs <= i64::from(self.max_secs)
    }
}

impl Default for LengthBounds {
    fn default() -> Self {
        Self {
            min_secs: DEFAULT_MIN_LENGTH_SECS,
            max_secs: DEFAULT_MAX_LENGTH_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Declares a lowercase string-backed enum with `as_str`, `FromStr`,
/// `Display`, and `TryFrom<String>` (used by sqlx row decoding).
macro_rules! define_text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $text:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $(#[serde(alias = $alias)])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The canonical persisted value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        "Invalid {} '{other}'. Must be one of: {}",
                        $label,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_text_enum! {
    /// Output frame orientation.
    AspectRatio, "aspect ratio" {
        Portrait = "portrait" | "9:16",
        Landscape = "landscape" | "16:9",
    }
}

define_text_enum! {
    /// Voiceover persona.
    Voice, "voice" {
        Sarah = "sarah",
        James = "james",
        Emma = "emma",
    }
}

define_text_enum! {
    /// Lifecycle status of a generation record.
    GenerationStatus, "status" {
        Pending = "pending",
        Completed = "completed",
        Failed = "failed",
    }
}

impl GenerationStatus {
    /// `completed` and `failed` never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, GenerationStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// Creation input
// ---------------------------------------------------------------------------

/// Raw creation input as received from a caller.
///
/// Enumerations arrive as strings so that an unknown value surfaces as a
/// validation error rather than a decoding failure.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerationRequest {
    #[validate(length(max = 4000, message = "prompt must be at most 4000 characters"))]
    pub prompt: String,
    pub aspect_ratio: String,
    #[serde(deserialize_with = "deserialize_length")]
    pub length: i64,
    pub voice: String,
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: Option<String>,
}

/// Validated creation input, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGeneration {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub length: i32,
    pub voice: Voice,
    pub image_url: Option<String>,
}

impl GenerationRequest {
    /// Validate every field and produce a [`NewGeneration`].
    ///
    /// An empty `image_url` is treated as absent. Nothing is coerced:
    /// any out-of-range value is a [`CoreError::Validation`].
    pub fn validate_with(mut self, bounds: &LengthBounds) -> Result<NewGeneration, CoreError> {
        if self
            .image_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.image_url = None;
        }

        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }

        if !bounds.contains(self.length) {
            return Err(CoreError::Validation(format!(
                "length must be between {} and {} seconds, got {}",
                bounds.min_secs, bounds.max_secs, self.length
            )));
        }

        Ok(NewGeneration {
            prompt: prompt.to_string(),
            aspect_ratio: self.aspect_ratio.parse()?,
            // Bounds are i32, so a contained value always fits.
            length: self.length as i32,
            voice: self.voice.parse()?,
            image_url: self.image_url,
        })
    }
}

/// Accept the length either as a JSON number or a numeric string.
fn deserialize_length<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLength {
        Number(i64),
        Text(String),
    }

    match RawLength::deserialize(deserializer)? {
        RawLength::Number(n) => Ok(n),
        RawLength::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("length '{s}' is not an integer"))),
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// The terminal outcome a caller wants to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { video_url: String },
    Failed { reason: String },
}

impl Outcome {
    /// Status the record lands in once this outcome is applied.
    pub fn status(&self) -> GenerationStatus {
        match self {
            Outcome::Completed { .. } => GenerationStatus::Completed,
            Outcome::Failed { .. } => GenerationStatus::Failed,
        }
    }

    /// Both variants must carry a non-empty value, otherwise the
    /// exactly-one-of `video_url`/`error_message` rule would break.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Outcome::Completed { video_url } if video_url.trim().is_empty() => Err(
                CoreError::Validation("video_url must not be empty".into()),
            ),
            Outcome::Failed { reason } if reason.trim().is_empty() => Err(
                CoreError::Validation("error_message must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        match self {
            Outcome::Completed { video_url } => Some(video_url),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Completed { .. } => None,
            Outcome::Failed { reason } => Some(reason),
        }
    }
}

/// Result of applying an outcome to an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionOutcome {
    /// The record was pending and now holds the outcome.
    Applied,
    /// The record was already terminal; nothing changed.
    Duplicate,
}

/// Decide whether an outcome may be applied to a record in `current`.
pub fn evaluate_transition(current: GenerationStatus) -> TransitionOutcome {
    if current.is_terminal() {
        TransitionOutcome::Duplicate
    } else {
        TransitionOutcome::Applied
    }
}

// ---------------------------------------------------------------------------
// Client-facing view
// ---------------------------------------------------------------------------

/// What a watching client should display for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationView {
    /// Keep estimating progress.
    Pending,
    /// Show the finished video.
    Completed { video_url: String },
    /// Show a terminal error.
    Failed { message: String },
}

impl GenerationView {
    /// Map persisted fields to a view.
    ///
    /// A `completed` record without a video URL keeps the client waiting;
    /// a `failed` record without a message falls back to
    /// [`GENERIC_FAILURE_MESSAGE`].
    pub fn resolve(
        status: GenerationStatus,
        video_url: Option<&str>,
        error_message: Option<&str>,
    ) -> Self {
        match status {
            GenerationStatus::Completed => match video_url {
                Some(url) if !url.is_empty() => GenerationView::Completed {
                    video_url: url.to_string(),
                },
                _ => GenerationView::Pending,
            },
            GenerationStatus::Failed => GenerationView::Failed {
                message: error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or(GENERIC_FAILURE_MESSAGE)
                    .to_string(),
            },
            GenerationStatus::Pending => GenerationView::Pending,
        }
    }

    /// View used when the identifier does not resolve to any record.
    pub fn unknown() -> Self {
        GenerationView::Failed {
            message: UNKNOWN_GENERATION_MESSAGE.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationView::Pending)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
