use std::{path::PathBuf, sync::Arc, time::Duration};
use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod api;
mod backoff;
mod catalog;
mod config;
mod dedupe;
mod events;
mod history;
mod orchestrator;
mod prompts;
mod providers;
mod rate_limit;
mod session;
mod spiritual;

use config::AppCfg;
use history::SessionHistory;
use orchestrator::{Orchestrator, Reflection};

#[derive(Parser)]
#[command(name = "soulful", version, about = "Mood-aware inspirational reflections")]
struct Cli {
    /// YAML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate reflections for the given moods in the terminal.
    Reflect {
        #[arg(long = "mood")]
        moods: Vec<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Print a thought of the day, optionally focused on themes.
    Thought {
        #[arg(long = "theme")]
        themes: Vec<String>,
    },
}

fn build_orchestrator(cfg: &AppCfg) -> Result<Orchestrator> {
    let generator = providers::build_generator(&cfg.provider)?;
    tracing::info!(provider = generator.name(), model = %cfg.provider.model, "text generator ready");
    Ok(Orchestrator::new(generator, cfg.generation.validate()?, cfg.content.validate()?, cfg.retry))
}

fn with_spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_reflection(r: &Reflection) {
    for e in &r.attempt_errors {
        eprintln!("{e}");
    }
    if let Some(w) = &r.warning {
        eprintln!("warning: {w}");
    }
    println!("\n  {}\n", r.message);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("soulful=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppCfg::load(cli.config.as_deref()).await?;

    match cli.command {
        Command::Serve { bind } => {
            let (tx, _rx) = broadcast::channel(256);
            let orch = build_orchestrator(&cfg)?.with_events(tx.clone());
            let state = api::AppState::new(Arc::new(orch), tx);
            let bind = bind.unwrap_or(cfg.server.bind.clone());
            api::serve(bind, state, Duration::from_secs(cfg.server.session_ttl_secs)).await
        }
        Command::Reflect { moods, count } => {
            let orch = build_orchestrator(&cfg)?;
            let mut history = SessionHistory::new();
            history.set_selected_tags(&moods);
            for _ in 0..count.max(1) {
                let pb = with_spinner("Generating new inspiration...");
                let r = orch.reflect("cli", &mut history).await;
                pb.finish_and_clear();
                print_reflection(&r);
            }
            Ok(())
        }
        Command::Thought { themes } => {
            let orch = build_orchestrator(&cfg)?;
            let pb = with_spinner("Finding today's thought...");
            let r = orch.thought_of_the_day(&themes).await;
            pb.finish_and_clear();
            print_reflection(&r);
            Ok(())
        }
    }
}
