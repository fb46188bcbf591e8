use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing::info;

use typedstream_core::config::load_config;
use typedstream_core::route::http_client;
use typedstream_core::tracing_init::{DEFAULT_FILTER, init_tracing};
use typedstream_core::receive_typed_stream_with;
use typedstream_demo::events::TICKS;
use typedstream_demo::routes::{AppState, build_router};

#[derive(Parser)]
#[command(name = "typedstream-demo")]
#[command(version, about = "Serve or watch a typed NDJSON stream", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// JSON stream settings file
    #[arg(long, env = "TYPEDSTREAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the stream server
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
        addr: SocketAddr,

        /// Milliseconds between ticks
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Ticks sent when a request gives no count
        #[arg(long, default_value_t = 10)]
        default_count: u64,
    },
    /// Print ticks streamed by a running server
    Watch {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080", env = "BASE_URL")]
        base_url: String,

        /// Number of ticks to request
        #[arg(long, default_value_t = 5)]
        count: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&format!("typedstream_demo=info,{DEFAULT_FILTER}"), cli.log_json);
    let stream = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve {
            addr,
            interval_ms,
            default_count,
        } => {
            let state = AppState {
                interval: Duration::from_millis(interval_ms),
                default_count,
                stream,
                ..AppState::default()
            };
            info!(%addr, ?state, "starting typedstream-demo");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, build_router(state)).await?;
        }
        Command::Watch { base_url, count } => watch(&base_url, count, &stream).await?,
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn watch(
    base_url: &str,
    count: u64,
    config: &typedstream_core::StreamConfig,
) -> anyhow::Result<()> {
    let client = http_client()?;
    let request = TICKS.request_with_query(&client, base_url, &format!("count={count}"));
    let res = TICKS
        .send(request)
        .await
        .with_context(|| format!("requesting {}", TICKS.url(base_url)))?;
    if !res.status().is_success() {
        bail!("server answered {}", res.status());
    }

    let mut ticks = receive_typed_stream_with(res, config)?;
    while let Some(tick) = ticks.next().await {
        let tick = tick?;
        println!("{}", serde_json::to_string(&tick)?);
    }
    info!("stream complete");
    Ok(())
}
