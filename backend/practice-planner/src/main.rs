use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use practice_planner::{
    config::Config, metrics::render_metrics, models::SessionSubmission, services::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "practice-planner", version, about = "Adaptive practice question planner")]
struct Cli {
    #[arg(long, global = true, help = "Print Prometheus metrics to stderr when done")]
    emit_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Plan and generate a batch of practice questions")]
    Generate {
        #[arg(short, long, help = "Learner id")]
        user: String,
        #[arg(short, long, default_value_t = 10, help = "Number of questions to request")]
        count: u32,
        #[arg(long, help = "Augment the brief with web search results")]
        web_search: bool,
    },
    #[command(about = "Summarize strengths, focus areas and next steps")]
    Insights {
        #[arg(short, long, help = "Learner id")]
        user: String,
    },
    #[command(about = "Record a finished session and its attempts")]
    Submit {
        #[arg(short, long, help = "Learner id")]
        user: String,
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "Session JSON file, or - for stdin",
            value_hint = clap::ValueHint::FilePath
        )]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let provider = init_telemetry();
    let otel_layer = provider.as_ref().map(|provider| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer().with_tracer(provider.tracer("practice-planner"))
    });

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "practice_planner=debug".into()),
        )
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(otel_layer)
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration is incomplete");
            std::process::exit(2);
        }
    };
    tracing::info!(
        subject = %config.planner.subject,
        env = %std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()),
        "Configuration loaded"
    );

    let result = run(cli.command, config).await;

    if cli.emit_metrics {
        match render_metrics() {
            Ok(text) => eprintln!("{}", text),
            Err(e) => tracing::warn!(error = %e, "Failed to render metrics"),
        }
    }

    shutdown_telemetry(provider);
    result
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    tracing::info!("MongoDB connected");

    let redis_client = config
        .redis_uri
        .as_deref()
        .map(redis::Client::open)
        .transpose()
        .context("Failed to create Redis client")?;

    let app_state = AppState::new(config, mongo_client, redis_client).await?;

    match command {
        Command::Generate {
            user,
            count,
            web_search,
        } => {
            let mut agent = app_state.agent_for(&user)?;
            let batch = agent.generate_questions(count, web_search).await?;
            if batch.questions.is_empty() {
                tracing::warn!(
                    user_id = %user,
                    "No questions generated, fall back to the static question bank"
                );
            }
            println!("{}", serde_json::to_string_pretty(&batch.questions)?);
        }
        Command::Insights { user } => {
            let agent = app_state.agent_for(&user)?;
            let insights = agent.learning_insights().await?;
            println!("{}", serde_json::to_string_pretty(&insights)?);
        }
        Command::Submit { user, file } => {
            let submission = read_submission(&file)?;
            let agent = app_state.agent_for(&user)?;
            let outcome = agent.update_performance(&submission).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn read_submission(path: &Path) -> anyhow::Result<SessionSubmission> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read session from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?
    };

    serde_json::from_str(&raw).context("Session JSON is not a valid submission")
}

/// Exports spans over OTLP/HTTP when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_telemetry() -> Option<SdkTracerProvider> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Failed to create OTLP exporter, tracing export disabled: {}", e);
            return None;
        }
    };

    let resource = Resource::builder_empty()
        .with_service_name("practice-planner")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    Some(provider)
}

fn shutdown_telemetry(provider: Option<SdkTracerProvider>) {
    if let Some(provider) = provider {
        tracing::info!("Shutting down OpenTelemetry");
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {}", e);
        }
    }
}
