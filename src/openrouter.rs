use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ModelSettings, RetrySettings};
use crate::error::ServiceError;
use crate::image_prep::{Encoding, PreparedImage};
use crate::models::Language;

/// Why a single chat-completions call failed. Never leaves this module.
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("OpenRouter error ({status}): {body}")]
  Status { status: StatusCode, body: String },

  #[error("response has no choices[0].message.content")]
  MissingContent,

  #[error("image encoding failed: {0}")]
  Encode(#[from] image::ImageError),

  #[error("invalid header value: {0}")]
  Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl ApiError {
  fn is_retryable(&self) -> bool {
    match self {
      ApiError::Status { status, .. } => {
        status.is_server_error()
          || *status == StatusCode::REQUEST_TIMEOUT
          || *status == StatusCode::TOO_MANY_REQUESTS
      }
      ApiError::Transport(_) | ApiError::MissingContent | ApiError::Encode(_) => true,
      ApiError::Header(_) => false,
    }
  }
}

#[derive(serde::Serialize)]
struct OpenRouterMessage {
  role: String,
  content: serde_json::Value,
}

#[derive(serde::Serialize)]
struct OpenRouterChatRequest {
  model: String,
  messages: Vec<OpenRouterMessage>,
  temperature: f32,
}

pub fn vision_prompt(language: Language) -> &'static str {
  match language {
    Language::En => {
      "Identify the landmark in the image and give a short introduction. \
       Answer in this format:\nName: <landmark name>\nLocation: <city, country>\n<short introduction>"
    }
    Language::Zh => {
      "识别图片中的地标建筑并给出简要介绍。请按以下格式回答：\n名称：<地标名称>\n位置：<城市，国家>\n<简要介绍>"
    }
  }
}

pub fn describe_prompt(name: &str, language: Language) -> String {
  match language {
    Language::En => format!("Introduce the landmark {name} in 4 sentences."),
    Language::Zh => format!("请用中文介绍地标建筑 {name}，约4句话。"),
  }
}

/// Client for the vision (recognition) and text (fallback) models.
pub struct OpenRouterClient {
  http: reqwest::Client,
  api_base: String,
  api_key: Option<String>,
  api_key_env: String,
  vision: ModelSettings,
  text: ModelSettings,
  retry: RetrySettings,
}

impl OpenRouterClient {
  /// Reads the credential from the environment variable named in the config.
  pub fn from_env(config: &AppConfig) -> Self {
    let key = std::env::var(&config.api_key_env).ok();
    Self::new(config, key)
  }

  pub fn new(config: &AppConfig, api_key: Option<String>) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_base: config.api_base.trim_end_matches('/').to_string(),
      api_key: api_key.filter(|k| !k.trim().is_empty()),
      api_key_env: config.api_key_env.clone(),
      vision: config.vision.clone(),
      text: config.text.clone(),
      retry: config.retry.clone(),
    }
  }

  pub fn has_credential(&self) -> bool {
    self.api_key.is_some()
  }

  fn credential(&self) -> Result<&str, ServiceError> {
    self.api_key.as_deref().ok_or_else(|| {
      ServiceError::Configuration(format!(
        "{} is not set. Export your OpenRouter key and restart.",
        self.api_key_env
      ))
    })
  }

  /// Ask the vision model what landmark the image shows.
  ///
  /// The first attempt sends PNG; retries re-encode as JPEG. Every failure
  /// cause collapses into `RecognitionUnavailable` once attempts run out.
  pub async fn identify(
    &self,
    image: &PreparedImage,
    language: Language,
  ) -> Result<String, ServiceError> {
    let key = self.credential()?;
    let attempts = self.retry.retries + 1;
    let mut backoff = Duration::from_millis(self.retry.backoff_ms);

    for attempt in 1..=attempts {
      let encoding = if attempt == 1 { Encoding::Png } else { Encoding::Jpeg };
      match self.identify_once(key, image, encoding, language).await {
        Ok(text) => {
          info!(attempt, model = %self.vision.model, "landmark recognized");
          return Ok(text);
        }
        Err(err) => {
          warn!(attempt, ?encoding, error = %err, "vision request failed");
          if !err.is_retryable() || attempt == attempts {
            break;
          }
          tokio::time::sleep(backoff).await;
          backoff = next_backoff(backoff);
        }
      }
    }

    error!(model = %self.vision.model, "image recognition unavailable");
    Err(ServiceError::RecognitionUnavailable)
  }

  async fn identify_once(
    &self,
    key: &str,
    image: &PreparedImage,
    encoding: Encoding,
    language: Language,
  ) -> Result<String, ApiError> {
    let img = image.encode(encoding)?;
    let url = format!("data:{};base64,{}", img.mime, img.base64);
    let content = serde_json::json!([
      { "type": "text", "text": vision_prompt(language) },
      { "type": "image_url", "image_url": { "url": url } }
    ]);
    let messages = vec![OpenRouterMessage {
      role: "user".to_string(),
      content,
    }];
    self.complete(key, &self.vision, messages).await
  }

  /// Ask the text model to describe a landmark the user named.
  pub async fn describe(&self, name: &str, language: Language) -> Result<String, ServiceError> {
    let key = self.credential()?;
    let messages = vec![OpenRouterMessage {
      role: "user".to_string(),
      content: serde_json::json!(describe_prompt(name, language)),
    }];

    match self.complete(key, &self.text, messages).await {
      Ok(text) => {
        info!(landmark = name, model = %self.text.model, "landmark described");
        Ok(text)
      }
      Err(err) => {
        error!(landmark = name, error = %err, "fallback description failed");
        Err(ServiceError::FallbackFailure(name.to_string()))
      }
    }
  }

  async fn complete(
    &self,
    key: &str,
    settings: &ModelSettings,
    messages: Vec<OpenRouterMessage>,
  ) -> Result<String, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    headers.insert("HTTP-Referer", HeaderValue::from_static("http://localhost"));
    headers.insert("X-Title", HeaderValue::from_static("Landmark Scout"));

    let payload = OpenRouterChatRequest {
      model: settings.model.clone(),
      messages,
      temperature: settings.temperature,
    };

    let resp = self
      .http
      .post(format!("{}/chat/completions", self.api_base))
      .headers(headers)
      .timeout(settings.timeout())
      .json(&payload)
      .send()
      .await?;

    if !resp.status().is_success() {
      let status = resp.status();
      let body = resp.text().await.unwrap_or_default();
      return Err(ApiError::Status { status, body });
    }

    let json_body = resp.json::<serde_json::Value>().await?;
    json_body["choices"][0]["message"]["content"]
      .as_str()
      .filter(|content| !content.trim().is_empty())
      .map(str::to_string)
      .ok_or(ApiError::MissingContent)
  }
}

fn next_backoff(current: Duration) -> Duration {
  current.saturating_mul(2)
}
