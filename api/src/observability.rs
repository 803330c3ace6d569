use anyhow::Result;
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::metrics;

pub struct Observability {
    pub registry: Registry,
}

impl Observability {
    /// Install the global subscriber and build the metrics registry.
    ///
    /// Logs go to stderr; stdout is reserved for `report` output.
    /// `LOG_FORMAT=json` switches to structured JSON lines.
    pub fn init() -> Result<Self> {
        let registry = Self::registry()?;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "arr_api=debug,arr_engine=info,tower_http=debug".into());

        let json = std::env::var("LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let subscriber = tracing_subscriber::registry().with(env_filter);
        if json {
            subscriber
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        } else {
            subscriber
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }

        tracing::info!("Observability stack initialized (Prometheus + tracing, json={})", json);
        Ok(Self { registry })
    }

    /// Registry with every service metric registered under the `arr` prefix.
    pub fn registry() -> Result<Registry> {
        let registry = Registry::new_custom(Some("arr".into()), None)?;
        metrics::register_all(&registry)?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_prefixed() {
        let registry = Observability::registry().unwrap();
        metrics::SNAPSHOT_CACHE_MISSES.inc();
        let families = registry.gather();
        assert!(!families.is_empty());
        for fam in &families {
            assert!(
                fam.get_name().starts_with("arr_"),
                "metric {} missing prefix",
                fam.get_name()
            );
        }
    }
}
