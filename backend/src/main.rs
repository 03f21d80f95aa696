use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use quantum_backend::{api, reward::RewardEngine, store::RedisStore, Config, Rewards};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file (defaults apply when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host interface to bind, overriding the configuration.
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind, overriding the configuration.
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(level: Level) -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "quantum-backend".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("quantum-backend");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(level)))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(host) = args.host {
        config.host = host.to_string();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?
        .validate()
        .context("invalid configuration")?;
    init_tracing(config.log_level)?;

    let store = RedisStore::new(&config.redis_url, config.key_prefix.clone())
        .context("failed to open redis client")?;
    let ledger = quantum_client::Client::new(config.ledger_url.as_str(), config.ledger_timeout)
        .context("failed to build ledger client")?;
    let engine = RewardEngine::with_seed(config.rewards.clone(), config.deterministic_seed);
    if config.deterministic_seed.is_some() {
        info!("reward draws are seeded");
    }
    info!(ledger = %config.ledger_url, "ledger configured");

    let rewards = Rewards::new(
        Arc::new(store),
        Arc::new(ledger),
        engine,
        config.options.clone(),
    );
    let app = api::router(Arc::new(rewards));

    let addr: SocketAddr = config.listen;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_listen_address() {
        let args = Args::parse_from(["quantum-backend", "--host", "0.0.0.0", "--port", "9090"]);
        let config = load_config(&args).unwrap().validate().unwrap();
        assert_eq!(config.listen, "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn defaults_without_config_file() {
        let args = Args::parse_from(["quantum-backend"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn missing_config_file_fails() {
        let args = Args::parse_from(["quantum-backend", "--config", "/nonexistent/quantum.yaml"]);
        assert!(load_config(&args).is_err());
    }
}
