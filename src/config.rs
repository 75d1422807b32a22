use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
  pub listen_addr: String,
  pub api_base: String,
  /// Name of the environment variable holding the OpenRouter key.
  pub api_key_env: String,
  pub vision: ModelSettings,
  pub text: ModelSettings,
  pub retry: RetrySettings,
  pub image: ImageSettings,
  pub speech: SpeechSettings,
  /// Sessions untouched for this long are dropped when the next one is created.
  pub session_idle_secs: u64,
}

impl AppConfig {
  pub fn session_idle(&self) -> Duration {
    Duration::from_secs(self.session_idle_secs)
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelSettings {
  pub model: String,
  pub temperature: f32,
  pub timeout_secs: u64,
}

impl ModelSettings {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Applies to the vision call only; the text fallback is a single attempt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
  pub retries: u32,
  pub backoff_ms: u64,
}

impl Default for RetrySettings {
  fn default() -> Self {
    Self {
      retries: 1,
      backoff_ms: 500,
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ImageSettings {
  /// Longest edge after downscaling; `None` sends the image as uploaded.
  pub normalize_to: Option<u32>,
  pub jpeg_quality: u8,
}

impl Default for ImageSettings {
  fn default() -> Self {
    Self {
      normalize_to: Some(768),
      jpeg_quality: 85,
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SpeechSettings {
  /// TTS program; `None` disables audio output.
  pub command: Option<String>,
  /// `{locale}` and `{text}` are substituted per utterance.
  pub args: Vec<String>,
  pub voices: BTreeMap<String, String>,
  pub default_locale: String,
}

impl Default for SpeechSettings {
  fn default() -> Self {
    let voices = [("en", "en-US"), ("zh", "zh-CN")]
      .into_iter()
      .map(|(tag, locale)| (tag.to_string(), locale.to_string()))
      .collect();
    Self {
      command: Some("espeak-ng".to_string()),
      args: vec!["-v".to_string(), "{locale}".to_string(), "{text}".to_string()],
      voices,
      default_locale: "en-US".to_string(),
    }
  }
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      listen_addr: "127.0.0.1:8787".to_string(),
      api_base: "https://openrouter.ai/api/v1".to_string(),
      api_key_env: "OPENROUTER_API_KEY".to_string(),
      vision: ModelSettings {
        model: "qwen/qwen-2.5-vl-7b-instruct:free".to_string(),
        temperature: 0.2,
        timeout_secs: 60,
      },
      text: ModelSettings {
        model: "xiaomi/mimo-v2-flash:free".to_string(),
        temperature: 0.3,
        timeout_secs: 30,
      },
      retry: RetrySettings::default(),
      image: ImageSettings::default(),
      speech: SpeechSettings::default(),
      session_idle_secs: 3600,
    }
  }
}

/// `LANDMARK_SCOUT_HOME` wins over the platform data directory.
pub fn data_dir() -> anyhow::Result<PathBuf> {
  if let Ok(home) = std::env::var("LANDMARK_SCOUT_HOME") {
    if !home.trim().is_empty() {
      return Ok(PathBuf::from(home));
    }
  }
  let base = dirs::data_dir().context("missing platform data dir")?;
  Ok(base.join("landmark-scout"))
}

pub fn load_or_init(path: &Path) -> anyhow::Result<AppConfig> {
  if path.exists() {
    let data = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&data)
      .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
  } else {
    let config = AppConfig::default();
    save_config(path, &config)?;
    Ok(config)
  }
}

pub fn save_config(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(config)?;
  std::fs::write(path, json)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn load_or_init_writes_defaults_on_first_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    let config = load_or_init(&path).expect("init");
    assert_eq!(config, AppConfig::default());
    assert!(path.exists());

    let reloaded = load_or_init(&path).expect("reload");
    assert_eq!(reloaded, config);
  }

  #[test]
  fn partial_config_fills_missing_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
      &path,
      r#"{ "listen_addr": "0.0.0.0:9000", "retry": { "retries": 3 } }"#,
    )
    .expect("write");

    let config = load_or_init(&path).expect("load");
    assert_eq!(config.listen_addr, "0.0.0.0:9000");
    assert_eq!(config.retry.retries, 3);
    assert_eq!(config.retry.backoff_ms, 500);
    assert_eq!(config.vision.model, AppConfig::default().vision.model);
    assert_eq!(config.speech.voices.get("zh").map(String::as_str), Some("zh-CN"));
    assert_eq!(config.session_idle(), Duration::from_secs(3600));
  }

  #[test]
  fn malformed_config_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").expect("write");

    let err = load_or_init(&path).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
  }

  #[test]
  fn defaults_match_remote_call_budget() {
    let config = AppConfig::default();
    assert!((config.vision.temperature - 0.2).abs() < f32::EPSILON);
    assert!((config.text.temperature - 0.3).abs() < f32::EPSILON);
    assert!(config.text.timeout() < config.vision.timeout());
  }
}
