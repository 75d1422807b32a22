//! Read-aloud playback behind an injectable backend.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::SpeechSettings;
use crate::models::Language;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
  pub text: String,
  pub locale: String,
}

/// An audio output device. Fire-and-forget: problems are logged, never returned.
pub trait SpeechBackend: Send + Sync {
  fn speak(&self, utterance: &Utterance);
  fn cancel(&self);
}

/// Used when no TTS program is configured.
pub struct SilentSpeech;

impl SpeechBackend for SilentSpeech {
  fn speak(&self, utterance: &Utterance) {
    info!(locale = %utterance.locale, chars = utterance.text.chars().count(), "speech disabled, utterance dropped");
  }

  fn cancel(&self) {}
}

/// Runs a system TTS program per utterance, e.g. `espeak-ng -v {locale} {text}`.
pub struct CommandSpeech {
  program: String,
  args: Vec<String>,
  current: Mutex<Option<tokio::process::Child>>,
}

impl CommandSpeech {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
      current: Mutex::new(None),
    }
  }

  fn render_args(&self, utterance: &Utterance) -> Vec<String> {
    self
      .args
      .iter()
      .map(|arg| {
        arg
          .replace("{locale}", &utterance.locale)
          .replace("{text}", &utterance.text)
      })
      .collect()
  }
}

impl SpeechBackend for CommandSpeech {
  fn speak(&self, utterance: &Utterance) {
    let mut cmd = tokio::process::Command::new(&self.program);
    cmd
      .args(self.render_args(utterance))
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .kill_on_drop(true);

    match cmd.spawn() {
      Ok(child) => {
        let mut slot = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(child);
      }
      Err(err) => warn!(program = %self.program, error = %err, "failed to start speech"),
    }
  }

  fn cancel(&self) {
    let child = self.current.lock().unwrap_or_else(|p| p.into_inner()).take();
    if let Some(mut child) = child {
      if let Err(err) = child.start_kill() {
        debug!(error = %err, "speech process already finished");
      }
    }
  }
}

/// At most one utterance is audible at a time.
pub struct SpeechController {
  backend: Arc<dyn SpeechBackend>,
  voices: BTreeMap<String, String>,
  default_locale: String,
  gate: Mutex<()>,
}

impl SpeechController {
  pub fn new(backend: Arc<dyn SpeechBackend>, settings: &SpeechSettings) -> Self {
    Self {
      backend,
      voices: settings.voices.clone(),
      default_locale: settings.default_locale.clone(),
      gate: Mutex::new(()),
    }
  }

  pub fn from_settings(settings: &SpeechSettings) -> Self {
    let backend: Arc<dyn SpeechBackend> = match settings.command.as_deref() {
      Some(program) if !program.trim().is_empty() => {
        Arc::new(CommandSpeech::new(program.trim(), settings.args.clone()))
      }
      _ => Arc::new(SilentSpeech),
    };
    Self::new(backend, settings)
  }

  pub fn locale_for(&self, language_tag: &str) -> &str {
    let key = language_tag
      .parse::<Language>()
      .map(|lang| lang.tag().to_string())
      .unwrap_or_else(|_| language_tag.trim().to_ascii_lowercase());
    self
      .voices
      .get(&key)
      .map(String::as_str)
      .unwrap_or(&self.default_locale)
  }

  /// Cancel whatever is playing, then read `text` aloud.
  pub fn start(&self, text: &str, language_tag: &str) {
    let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
    self.backend.cancel();

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
      return;
    }
    let utterance = Utterance {
      text,
      locale: self.locale_for(language_tag).to_string(),
    };
    self.backend.speak(&utterance);
  }

  /// Safe to call when nothing is playing.
  pub fn stop(&self) {
    let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
    self.backend.cancel();
  }
}


#[cfg(test)]
mod tests {
  use super::testing::{Event, RecordingSpeech};
  use super::*;

  fn controller() -> (Arc<RecordingSpeech>, SpeechController) {
    let backend = Arc::new(RecordingSpeech::default());
    let controller = SpeechController::new(backend.clone(), &SpeechSettings::default());
    (backend, controller)
  }

  #[test]
  fn second_start_replaces_first() {
    let (backend, speech) = controller();
    speech.start("first text", "en");
    speech.start("other text", "en");

    assert_eq!(backend.audible().unwrap().text, "other text");
    let events = backend.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], Event::Cancel);
    assert_eq!(events[2], Event::Cancel);
  }

  #[test]
  fn stop_is_safe_when_idle_and_after_playback() {
    let (backend, speech) = controller();
    speech.stop();
    speech.start("hello", "en");
    speech.stop();
    speech.stop();
    assert!(backend.audible().is_none());
  }

  #[test]
  fn locale_mapping_with_default() {
    let (backend, speech) = controller();
    assert_eq!(speech.locale_for("en"), "en-US");
    assert_eq!(speech.locale_for("中文"), "zh-CN");
    assert_eq!(speech.locale_for("fr"), "en-US");

    speech.start("你好", "zh");
    assert_eq!(backend.audible().unwrap().locale, "zh-CN");
  }

  #[test]
  fn newlines_are_flattened_and_blank_text_is_not_spoken() {
    let (backend, speech) = controller();
    speech.start("Name: Eiffel Tower\nLocation: Paris", "en");
    assert_eq!(
      backend.audible().unwrap().text,
      "Name: Eiffel Tower Location: Paris"
    );

    speech.start("  \n ", "en");
    assert!(backend.audible().is_none());
  }

  #[test]
  fn command_args_are_rendered_per_utterance() {
    let speech = CommandSpeech::new(
      "espeak-ng",
      vec!["-v".to_string(), "{locale}".to_string(), "{text}".to_string()],
    );
    let args = speech.render_args(&Utterance {
      text: "Big Ben".to_string(),
      locale: "en-US".to_string(),
    });
    assert_eq!(args, vec!["-v", "en-US", "Big Ben"]);
  }
}
