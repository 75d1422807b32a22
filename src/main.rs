mod config;
mod error;
mod image_prep;
mod interpreter;
mod logger;
mod models;
mod openrouter;
mod router;
mod service;
mod session;
mod speech;

use std::time::Instant;

use anyhow::Context;
use tracing::{error, info};

use config::load_or_init;
use openrouter::OpenRouterClient;
use router::{run_router, RouterState};
use service::LandmarkService;
use speech::SpeechController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let data_dir = config::data_dir()?;
  std::fs::create_dir_all(&data_dir)
    .with_context(|| format!("cannot create data dir {}", data_dir.display()))?;

  let config_path = data_dir.join("config.json");
  let log_path = data_dir.join("landmark-scout.log");

  logger::init(&log_path)?;
  let config = load_or_init(&config_path)?;
  info!(config = %config_path.display(), log = %log_path.display(), "Landmark Scout starting up");

  let client = OpenRouterClient::from_env(&config);
  if !client.has_credential() {
    error!(
      variable = %config.api_key_env,
      "OpenRouter credential missing; recognition requests will report a configuration error"
    );
  }

  let speech = SpeechController::from_settings(&config.speech);
  let service = LandmarkService::new(client, speech, config.image.clone())
    .with_session_idle(config.session_idle());

  let listener = std::net::TcpListener::bind(&config.listen_addr)
    .with_context(|| format!("cannot bind {}", config.listen_addr))?;
  info!(addr = %listener.local_addr()?, "router listening");

  let state = RouterState {
    started_at: Instant::now(),
    service,
  };
  if let Err(err) = run_router(listener, state).await {
    error!(error = %err, "router error");
    return Err(err);
  }
  Ok(())
}
