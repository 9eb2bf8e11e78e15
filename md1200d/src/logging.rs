//! Tracing subscriber setup

use md1200_core::config::{LogFormat, LoggingConfig, MetricsExporter, TelemetryConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
fn default_directive(config: &LoggingConfig, verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        config.level.as_str()
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `--verbose`, which wins over the configured level.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbose)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    Ok(())
}

/// Log the telemetry settings. No exporter is started.
pub fn report_telemetry(config: &TelemetryConfig) {
    if config.metrics_enabled {
        match config.exporter() {
            MetricsExporter::Prometheus => info!(
                port = config.metrics_port,
                "metrics configured for prometheus"
            ),
            MetricsExporter::OtlpGrpc => info!("metrics configured for otlp grpc (local mode)"),
        }
    }

    if config.tracing_enabled {
        info!(
            service = %config.tracing_service,
            version = config.tracing_version.as_deref().unwrap_or("unknown"),
            sample_rate = config.tracing_sample_rate,
            "tracing configured"
        );
    }
}
