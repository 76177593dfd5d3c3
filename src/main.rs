//! CLI for ChannelHub
//!
//! Subcommands:
//! - `api`: serve the HTTP API
//! - `relay`: forward received messages to the foreign channel
//! - `spreader`: fan notifications out to matching subscriptions
//! - `deliverer`: POST queued notifications to subscriber callbacks
//! - `all`: everything above in one process
//!
//! Each worker subcommand starts `worker.concurrency` processors for its
//! stage. sled locks `storage.path` to one process, so single-stage
//! subcommands cannot run side by side on the same database; a durable
//! deployment runs `all` and scales stages with `worker.concurrency`.

use channelhub::app::App;
use channelhub::config::load_config;
use channelhub::transport::{ApiState, serve};
use channelhub::utils::logging;
use channelhub::worker::{Processor, Step};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "channelhub")]
struct Cli {
    /// Keep every store in process memory instead of opening sled
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Serve the HTTP API
    Api,
    /// Run the foreign relay worker
    Relay,
    /// Run the subscriber fan-out worker
    Spreader,
    /// Run the callback delivery worker
    Deliverer,
    /// Run the API and all workers together
    All,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("ChannelHub failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&settings.log.level);
    if cli.in_memory {
        settings.storage.in_memory = true;
    }

    let app = App::from_settings(settings)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let (api, relay, spreader, deliverer) = match cli.command {
        Command::Api => (true, false, false, false),
        Command::Relay => (false, true, false, false),
        Command::Spreader => (false, false, true, false),
        Command::Deliverer => (false, false, false, true),
        Command::All => (true, true, true, true),
    };

    if api {
        let addr = app.settings.bind_addr();
        let state = ApiState::from_app(&app);
        let mut rx = shutdown_rx.clone();
        tasks.spawn(async move {
            let shutdown = async move {
                let _ = rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = serve(&addr, state, shutdown).await {
                error!("HTTP API failed: {}", e);
            }
        });
    }
    for _ in 0..app.workers_per_stage() {
        if relay {
            spawn_processor(&mut tasks, &app, app.process_message(), shutdown_rx.clone());
        }
        if spreader {
            spawn_processor(&mut tasks, &app, app.dispatch_to_subscribers(), shutdown_rx.clone());
        }
        if deliverer {
            spawn_processor(&mut tasks, &app, app.deliver_callback(), shutdown_rx.clone());
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
        _ = tasks.join_next() => {
            error!("A ChannelHub task exited unexpectedly.");
        }
    }

    let _ = shutdown_tx.send(true);
    while tasks.join_next().await.is_some() {}
    Ok(())
}

fn spawn_processor<S: Step + 'static>(
    tasks: &mut JoinSet<()>,
    app: &App,
    step: S,
    shutdown: watch::Receiver<bool>,
) {
    let processor = Processor::new(step, app.poll_interval());
    tasks.spawn(processor.run(shutdown));
}
