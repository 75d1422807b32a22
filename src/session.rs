use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::interpreter::{parse_landmark, ParsedLandmark};
use crate::models::{Language, RecognitionReply, ReplySource, SessionView};

/// State of one interactive session. Written only by the request that
/// currently holds its `InFlight` guard.
pub struct Session {
  pub id: Uuid,
  pub last_reply: Option<RecognitionReply>,
  pub parsed: Option<ParsedLandmark>,
  pub recognition_failed: bool,
  pub busy: bool,
  pub language: Language,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Session {
  fn new(id: Uuid) -> Self {
    let now = Utc::now();
    Self {
      id,
      last_reply: None,
      parsed: None,
      recognition_failed: false,
      busy: false,
      language: Language::default(),
      created_at: now,
      updated_at: now,
    }
  }

  /// Replace the current result; the parsed record is always rebuilt from the text.
  pub fn record_reply(&mut self, source: ReplySource, text: String, language: Language) {
    let received_at = Utc::now();
    self.parsed = Some(parse_landmark(&text));
    self.last_reply = Some(RecognitionReply {
      source,
      text,
      received_at,
    });
    if source == ReplySource::Recognition {
      self.recognition_failed = false;
    }
    self.language = language;
    self.updated_at = received_at;
  }

  /// Previous results stay visible; only the manual-entry path opens up.
  pub fn mark_recognition_failed(&mut self, language: Language) {
    self.recognition_failed = true;
    self.language = language;
    self.updated_at = Utc::now();
  }

  pub fn view(&self) -> SessionView {
    SessionView {
      session_id: self.id,
      busy: self.busy,
      recognition_failed: self.recognition_failed,
      manual_entry_available: self.recognition_failed,
      notice: self
        .recognition_failed
        .then(|| self.language.busy_notice().to_string()),
      reply: self.last_reply.clone(),
      landmark: self.parsed.clone(),
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

pub type SharedSession = Arc<Mutex<Session>>;

pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
  session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a session busy for the lifetime of one request.
pub struct InFlight {
  session: SharedSession,
}

impl InFlight {
  pub fn begin(session: &SharedSession) -> Result<Self, ServiceError> {
    let mut guard = lock(session);
    if guard.busy {
      return Err(ServiceError::SessionBusy);
    }
    guard.busy = true;
    Ok(Self {
      session: session.clone(),
    })
  }

  pub fn session(&self) -> MutexGuard<'_, Session> {
    lock(&self.session)
  }
}

impl Drop for InFlight {
  fn drop(&mut self) {
    lock(&self.session).busy = false;
  }
}

#[derive(Default)]
pub struct SessionStore {
  sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
  pub fn create(&self) -> Uuid {
    let id = Uuid::new_v4();
    let session = Arc::new(Mutex::new(Session::new(id)));
    self
      .sessions
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .insert(id, session);
    id
  }

  pub fn get(&self, id: Uuid) -> Result<SharedSession, ServiceError> {
    self
      .sessions
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .get(&id)
      .cloned()
      .ok_or(ServiceError::SessionNotFound(id))
  }

  pub fn remove(&self, id: Uuid) -> Result<(), ServiceError> {
    self
      .sessions
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .remove(&id)
      .map(|_| ())
      .ok_or(ServiceError::SessionNotFound(id))
  }

  /// Drop sessions untouched for longer than `max_idle`. Busy sessions stay.
  pub fn purge_idle(&self, max_idle: Duration) -> usize {
    let cutoff = Utc::now() - max_idle;
    let mut sessions = self
      .sessions
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    let before = sessions.len();
    sessions.retain(|_, session| {
      let state = lock(session);
      state.busy || state.updated_at >= cutoff
    });
    before - sessions.len()
  }

  pub fn len(&self) -> usize {
    self
      .sessions
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .len()
  }
}
