use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::interpreter::ParsedLandmark;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
  #[default]
  En,
  Zh,
}

impl Language {
  pub fn tag(self) -> &'static str {
    match self {
      Language::En => "en",
      Language::Zh => "zh",
    }
  }

  /// Resolve the tag of an inbound request; missing or blank means English.
  pub fn from_request(tag: Option<&str>) -> Result<Self, ServiceError> {
    match tag.map(str::trim).filter(|t| !t.is_empty()) {
      None => Ok(Language::default()),
      Some(t) => t
        .parse()
        .map_err(|_| ServiceError::UnknownLanguage(t.to_string())),
    }
  }

  /// Shown next to the manual-entry field after recognition fails.
  pub fn busy_notice(self) -> &'static str {
    match self {
      Language::En => "Image recognition service is busy.",
      Language::Zh => "图像识别服务繁忙",
    }
  }
}

impl FromStr for Language {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      t if t.eq_ignore_ascii_case("en") || t.eq_ignore_ascii_case("english") => Ok(Language::En),
      t if t.eq_ignore_ascii_case("zh") || t.eq_ignore_ascii_case("chinese") || t == "中文" => {
        Ok(Language::Zh)
      }
      other => Err(format!("Unsupported language '{other}'.")),
    }
  }
}

impl TryFrom<String> for Language {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Language> for String {
  fn from(value: Language) -> Self {
    value.tag().to_string()
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct ImageData {
  pub mime: String,
  pub base64: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
  Recognition,
  Fallback,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecognitionReply {
  pub source: ReplySource,
  pub text: String,
  pub received_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct IdentifyRequest {
  pub image: ImageData,
  #[serde(default)]
  pub language: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FallbackRequest {
  pub name: String,
  #[serde(default)]
  pub language: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SessionSpeechRequest {
  #[serde(default)]
  pub language: Option<String>,
}

/// The language is a raw tag so unmapped tags reach the default voice.
#[derive(Serialize, Deserialize)]
pub struct SpeechStartRequest {
  pub text: String,
  #[serde(default)]
  pub language: String,
}

#[derive(Serialize, Deserialize)]
pub struct SessionCreated {
  pub session_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionView {
  pub session_id: Uuid,
  pub busy: bool,
  pub recognition_failed: bool,
  pub manual_entry_available: bool,
  pub notice: Option<String>,
  pub reply: Option<RecognitionReply>,
  pub landmark: Option<ParsedLandmark>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: String,
  pub version: String,
  pub uptime_ms: u128,
  pub credential_configured: bool,
}
