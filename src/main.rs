// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! nvr-core — NVR live-streaming and recording core
//!
//! Usage:
//!   nvr-core run   --config config.toml
//!   nvr-core check --config config.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nvr_core::api;
use nvr_core::config::Config;
use nvr_core::dispatch::Dispatcher;
use nvr_core::egress::mp4::Mp4Egress;
use nvr_core::egress::rtmp::RtmpEgress;
use nvr_core::sink::live::{LiveParams, LiveSink};
use nvr_core::sink::record::{RecordParams, RecordSink};
use nvr_core::source::FrameSource;

#[derive(Parser)]
#[command(name = "nvr-core", about = "NVR live-streaming and recording core", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start capturing and dispatching to the configured sinks.
    Run {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Validate a configuration file and print the resolved settings.
    Check {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            if let Err(e) = run(config).await {
                error!(error = %e, "Fatal");
                std::process::exit(1);
            }
        }
        Command::Check { config } => {
            run_check(config);
        }
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let cfg = Config::from_file(&config_path).context("load config")?;

    info!(
        source = cfg.source.url,
        live = cfg.live.is_some(),
        record = cfg.record.is_some(),
        "Starting NVR core"
    );

    let mut dispatcher = Dispatcher::new();
    let mut live_sink = None;
    let mut record_sink = None;
    let mut gate = None;

    if let Some(live_cfg) = &cfg.live {
        let sink = LiveSink::start(
            LiveParams::from_config(live_cfg),
            RtmpEgress::new(&live_cfg.url),
        )
        .context("start live sink")?;
        dispatcher.attach(sink.port());
        info!(url = live_cfg.url, "live sink registered");
        live_sink = Some(sink);
    }

    if let Some(rec_cfg) = &cfg.record {
        let sink = RecordSink::start(RecordParams::from_config(rec_cfg), Mp4Egress::new(rec_cfg))
            .context("start record sink")?;
        dispatcher.attach(sink.port());
        gate = Some(sink.gate());
        info!(
            path = %rec_cfg.path.display(),
            segment_secs = rec_cfg.segment_secs,
            use_md = rec_cfg.use_md,
            "record sink registered"
        );
        record_sink = Some(sink);
    }

    let dispatcher = Arc::new(dispatcher);
    let mut source = FrameSource::spawn(cfg.source.clone(), dispatcher.clone())
        .context("start frame source")?;

    if cfg.api.enabled {
        let state = Arc::new(api::AppState {
            dispatcher: dispatcher.clone(),
            gate: gate.clone(),
        });
        let port = cfg.api.port;
        tokio::spawn(async move {
            api::start_server(state, port).await;
        });
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received CTRL+C, shutting down…"),
        Err(e) => error!(error = %e, "Signal error"),
    }

    // Stop the producer first so the sinks drain nothing new, then join
    // the workers.
    source.stop();
    if let Some(mut sink) = live_sink {
        sink.close();
    }
    if let Some(mut sink) = record_sink {
        sink.close();
    }
    Ok(())
}

fn run_check(config_path: PathBuf) {
    match Config::from_file(&config_path) {
        Ok(cfg) => match serde_json::to_string_pretty(&cfg) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
