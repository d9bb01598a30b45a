use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gnss_logger::config::Config;
use gnss_logger::replay::{Action, Runner, Script};
use gnss_logger::store::Store;

#[derive(Parser)]
#[command(name = "gnss-logger")]
#[command(about = "Correlated GNSS fix and satellite logging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a replay script
    Validate { script: PathBuf },
    /// Drive a collection session from a replay script
    Replay {
        #[arg(long)]
        config: Option<PathBuf>,
        script: PathBuf,
    },
    /// Print every stored fix with its satellites as JSON lines
    Dump {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Database to read instead of the configured one
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { script } => validate(&script),
        Commands::Replay { config, script } => run_replay(config.as_deref(), &script).await,
        Commands::Dump { config, database } => dump(config.as_deref(), database),
    }
}

fn load_script(path: &Path) -> Option<Script> {
    let yaml = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return None;
        }
    };

    match Script::from_str(&yaml) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("Parse error: {}", e);
            None
        }
    }
}

fn load_config(path: Option<&Path>) -> Option<Config> {
    match Config::load(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Config error: {}", e);
            None
        }
    }
}

fn validate(path: &Path) -> ExitCode {
    let Some(script) = load_script(path) else {
        return ExitCode::FAILURE;
    };

    println!("Script is valid ({} steps)", script.steps.len());
    for (i, step) in script.steps.iter().enumerate() {
        let time_str = match &step.time {
            Some(t) => format!("T+{}", humantime::format_duration(*t)),
            None => "immediate".to_string(),
        };
        println!("  {}: {} @ {}", i + 1, describe(&step.action), time_str);
    }
    ExitCode::SUCCESS
}

fn describe(action: &Action) -> String {
    match action {
        Action::Satellites(sats) => format!("{} ({} satellites)", action.name(), sats.len()),
        Action::Fix(Some(p)) => format!("{} ({}, {})", action.name(), p.latitude, p.longitude),
        _ => action.name().to_string(),
    }
}

async fn run_replay(config: Option<&Path>, script: &Path) -> ExitCode {
    let Some(config) = load_config(config) else {
        return ExitCode::FAILURE;
    };
    let Some(script) = load_script(script) else {
        return ExitCode::FAILURE;
    };

    let start_time = chrono::Local::now();
    println!("Starting replay at {}", start_time);

    let summary = Runner::new(config, script).run().await;

    match serde_json::to_string(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode summary: {}", e),
    }
    if summary.interrupted {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn dump(config: Option<&Path>, database: Option<PathBuf>) -> ExitCode {
    let Some(config) = load_config(config) else {
        return ExitCode::FAILURE;
    };
    let path = database.unwrap_or(config.database.path);

    let fixes = match Store::open_read_only(&path).and_then(|store| store.fixes()) {
        Ok(fixes) => fixes,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    for fix in &fixes {
        match serde_json::to_string(fix) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode fix {}: {}", fix.id, e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
