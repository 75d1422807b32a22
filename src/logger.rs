use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: console output plus an append-only log file.
///
/// Level comes from `RUST_LOG`, falling back to `info`.
pub fn init(path: &Path) -> anyhow::Result<()> {
  let file = OpenOptions::new().create(true).append(true).open(path)?;

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  let console_layer = fmt::layer().with_target(false);
  let file_layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));

  tracing_subscriber::registry()
    .with(filter)
    .with(console_layer)
    .with(file_layer)
    .try_init()?;
  Ok(())
}
