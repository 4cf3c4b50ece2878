use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const DEFAULT_FILTER: &str = "tutorcache=info";

fn filter(config: &LogConfig) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    config
      .filter
      .as_deref()
      .and_then(|f| EnvFilter::try_new(f).ok())
      .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
  })
}

/// Install the global subscriber.
///
/// With a log directory configured, output goes to a daily rolling file and
/// the returned guard must be kept alive to flush it.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let registry = tracing_subscriber::registry().with(filter(config));

  match &config.directory {
    Some(directory) => {
      std::fs::create_dir_all(directory)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;
      let appender = tracing_appender::rolling::daily(directory, "tutorcache.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      registry
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      registry
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
      Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_invalid_filter_falls_back() {
    let config = LogConfig {
      filter: Some("=[not a filter".to_string()),
      directory: None,
    };
    // Must not panic on a malformed directive
    let _ = filter(&config);
  }
}
