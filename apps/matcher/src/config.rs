use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Application configuration loaded from environment variables.
/// Every knob has a default so both binaries run without a `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the persisted {ensemble, schema} bundle.
    pub model_path: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "model.bin".to_string())
                .into(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Filter for the fmt subscriber, built from `rust_log` (which already
    /// honors `RUST_LOG`). The default level must stay unscoped: the
    /// binaries compile as their own crates (`train`, `score`), so a
    /// `matcher=`-prefixed directive would silence every event they emit
    /// themselves.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::new(&self.rust_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_defaults_apply_without_env() {
        let config = Config::from_env().unwrap();
        assert!(!config.rust_log.is_empty());
        assert!(config.model_path.as_os_str().len() > 0);
    }

    struct CountingLayer(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountingLayer {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_filter_passes_binary_crate_targets() {
        let config = Config {
            model_path: "model.bin".into(),
            rust_log: "info".to_string(),
        };
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(config.log_filter())
            .with(CountingLayer(count.clone()));

        tracing::subscriber::with_default(subscriber, || {
            // the metric report logs from the `train` crate, not `matcher`
            tracing::info!(target: "train", "report line");
            tracing::info!(target: "matcher::driver", "library line");
            tracing::debug!(target: "train", "below the configured level");
        });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
