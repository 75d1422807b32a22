use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImageSettings;
use crate::error::ServiceError;
use crate::image_prep;
use crate::models::{ImageData, Language, ReplySource, SessionView};
use crate::openrouter::OpenRouterClient;
use crate::session::{lock, InFlight, SessionStore};
use crate::speech::SpeechController;

/// Recognition with manual fallback, one request at a time per session.
pub struct LandmarkService {
  client: OpenRouterClient,
  sessions: SessionStore,
  speech: SpeechController,
  image: ImageSettings,
  session_idle: chrono::Duration,
}

const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(3600);

impl LandmarkService {
  pub fn new(client: OpenRouterClient, speech: SpeechController, image: ImageSettings) -> Self {
    Self {
      client,
      sessions: SessionStore::default(),
      speech,
      image,
      session_idle: idle_limit(DEFAULT_SESSION_IDLE),
    }
  }

  pub fn with_session_idle(mut self, idle: Duration) -> Self {
    self.session_idle = idle_limit(idle);
    self
  }

  pub fn credential_configured(&self) -> bool {
    self.client.has_credential()
  }

  pub fn create_session(&self) -> Uuid {
    let purged = self.sessions.purge_idle(self.session_idle);
    if purged > 0 {
      info!(purged, "idle sessions dropped");
    }
    let id = self.sessions.create();
    info!(session = %id, active = self.sessions.len(), "session created");
    id
  }

  pub fn session_view(&self, id: Uuid) -> Result<SessionView, ServiceError> {
    let session = self.sessions.get(id)?;
    let view = lock(&session).view();
    Ok(view)
  }

  pub fn delete_session(&self, id: Uuid) -> Result<(), ServiceError> {
    self.sessions.remove(id)?;
    info!(session = %id, "session deleted");
    Ok(())
  }

  /// Run image recognition for a session.
  ///
  /// A recognition failure is not an error here: the session is flagged and
  /// the returned view offers manual entry.
  pub async fn identify(
    &self,
    id: Uuid,
    upload: &ImageData,
    language: Language,
  ) -> Result<SessionView, ServiceError> {
    let session = self.sessions.get(id)?;
    let in_flight = InFlight::begin(&session)?;

    let bytes = image_prep::decode_upload(upload)?;
    let settings = self.image.clone();
    let image = tokio::task::spawn_blocking(move || image_prep::prepare(&bytes, &settings))
      .await
      .map_err(|err| ServiceError::InvalidImage(format!("image processing aborted: {err}")))??;
    let (width, height) = image.dimensions();
    info!(session = %id, width, height, %language, "image prepared");

    match self.client.identify(&image, language).await {
      Ok(text) => {
        in_flight
          .session()
          .record_reply(ReplySource::Recognition, text, language);
      }
      Err(ServiceError::RecognitionUnavailable) => {
        warn!(session = %id, "recognition failed, manual entry offered");
        in_flight.session().mark_recognition_failed(language);
      }
      Err(err) => return Err(err),
    }

    drop(in_flight);
    let view = lock(&session).view();
    Ok(view)
  }

  /// Describe a landmark the user typed after recognition failed.
  pub async fn fallback(
    &self,
    id: Uuid,
    name: &str,
    language: Language,
  ) -> Result<SessionView, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(ServiceError::EmptyLandmarkName);
    }

    let session = self.sessions.get(id)?;
    let in_flight = InFlight::begin(&session)?;
    let failed = in_flight.session().recognition_failed;
    if !failed {
      return Err(ServiceError::ManualEntryUnavailable);
    }

    let text = self.client.describe(name, language).await?;
    in_flight
      .session()
      .record_reply(ReplySource::Fallback, text, language);

    drop(in_flight);
    let view = lock(&session).view();
    Ok(view)
  }

  /// Read the session's current result aloud.
  pub fn speak(&self, id: Uuid, language: Language) -> Result<(), ServiceError> {
    let session = self.sessions.get(id)?;
    let text = lock(&session)
      .last_reply
      .as_ref()
      .map(|reply| reply.text.clone())
      .ok_or(ServiceError::NothingToSpeak)?;
    self.speech.start(&text, language.tag());
    Ok(())
  }

  pub fn speak_text(&self, text: &str, language_tag: &str) {
    self.speech.start(text, language_tag);
  }

  pub fn stop_speech(&self) {
    self.speech.stop();
  }
}

fn idle_limit(idle: Duration) -> chrono::Duration {
  let ceiling = chrono::Duration::weeks(52 * 100);
  chrono::Duration::from_std(idle).map_or(ceiling, |idle| idle.min(ceiling))
}
