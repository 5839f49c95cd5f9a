use anyhow::Context;
use clap::{Parser, Subcommand};
use rfmedia::controller::HOTKEY_BINDINGS;
use rfmedia::platform::JsonFileStorage;
use rfmedia::{Platform, Scenario};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "rfmedia", version, about = "Headless media UI state engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON scenario and print the resulting snapshots
    Run {
        scenario: PathBuf,
        /// Persist preferences to this JSON file
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },
    /// List the controller hotkeys
    Keys,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            prefs,
            compact,
        } => {
            let parsed = Scenario::load(&scenario)
                .with_context(|| format!("failed to read scenario {}", scenario.display()))?;
            let mut platform = Platform::new();
            if !parsed.languages.is_empty() {
                platform = platform.with_languages(parsed.languages.iter().cloned());
            }
            if let Some(path) = prefs {
                let storage = JsonFileStorage::open(&path)
                    .with_context(|| format!("failed to open preferences {}", path.display()))?;
                platform = platform.with_storage(Rc::new(storage));
            }
            log::info!("replaying {} steps", parsed.steps.len());
            let report = parsed.run_on(Rc::new(platform)).context("scenario failed")?;
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
        }
        Command::Keys => {
            for (key, action) in HOTKEY_BINDINGS {
                println!("{key:<12} {action}");
            }
        }
    }
    Ok(())
}
