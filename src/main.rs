use clap::Parser;
use coinpal_lib::config::Config;
use coinpal_lib::logging;
use coinpal_lib::persona::Mode;
use coinpal_lib::Assistant;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(
    name = "coinpal",
    version,
    about = "Dual-persona crypto assistant with a self-training loop"
)]
struct Cli {
    /// Path to a JSON config file (defaults to $COINPAL_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Never call market or news APIs
    #[arg(long)]
    offline: bool,

    /// Start the training loop immediately
    #[arg(long)]
    train: bool,
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "Commands:
  /mode <primary|stylized>  switch persona
  /train start|stop|once    control the training loop
  /status                   show statistics
  /export                   write a session export
  /exports                  list exports stored in the database
  /quit                     export and exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)?;
            config.apply_env_overrides();
            config.validate()?;
            config
        }
        None => Config::from_env()?,
    };
    if cli.offline {
        config.external.enabled = false;
    }

    logging::init_logging(config.data.log_dir.as_deref())?;
    if let Some(dir) = &config.data.log_dir {
        if let Ok(removed) = logging::cleanup_old_logs(dir) {
            if removed > 0 {
                logging::log_conversation(None, &format!("Removed {} old log files", removed));
            }
        }
    }

    let assistant = Assistant::new(config)?;
    if cli.train {
        assistant.start_training();
    }

    println!("{} is ready. Type /help for commands.", assistant.active_mode().display_name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();

        if let Some(command) = input.strip_prefix('/') {
            match handle_command(&assistant, command).await {
                Flow::Continue => continue,
                Flow::Quit => break,
            }
        }

        let reply = assistant.send_message(input).await;
        println!("{}: {}", reply.mode.display_name(), reply.message);
    }

    let result = assistant.shutdown().await?;
    println!("Session exported to {}", result.path.display());
    Ok(())
}

async fn handle_command(assistant: &Assistant, command: &str) -> Flow {
    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("mode"), Some(name)) => match Mode::from_str(name) {
            Some(mode) => {
                assistant.switch(mode);
                println!("Now talking to {}.", mode.display_name());
            }
            None => println!("Unknown mode '{}'. Use primary or stylized.", name),
        },
        (Some("mode"), None) => println!("Current mode: {}", assistant.active_mode().as_str()),
        (Some("train"), Some("start")) => {
            if assistant.start_training() {
                println!("Training loop started.");
            } else {
                println!("Training loop is already running.");
            }
        }
        (Some("train"), Some("stop")) => {
            if assistant.stop_training().await {
                println!("Training loop stopped.");
            } else {
                println!("Training loop is not running.");
            }
        }
        (Some("train"), Some("once")) => match assistant.run_training_cycle().await {
            Ok(session) => println!(
                "Cycle {}: quality {:.3}, velocity {:+.4}, interval {:.1}s",
                session.cycle_index,
                session.aggregate_quality,
                session.learning_velocity,
                session.interval_seconds
            ),
            Err(e) => println!("Training cycle failed: {}", e),
        },
        (Some("status"), _) => match serde_json::to_string_pretty(&assistant.get_status()) {
            Ok(status) => println!("{}", status),
            Err(e) => println!("Status unavailable: {}", e),
        },
        (Some("export"), _) => match assistant.export() {
            Ok(result) => println!("Exported {} turns to {}", result.turns, result.path.display()),
            Err(e) => println!("Export failed: {}", e),
        },
        (Some("exports"), _) => match assistant.stored_exports() {
            Ok(keys) if keys.is_empty() => println!("No stored exports."),
            Ok(keys) => keys.iter().for_each(|key| println!("  {}", key)),
            Err(e) => println!("Stored exports unavailable: {}", e),
        },
        (Some("quit"), _) | (Some("exit"), _) => return Flow::Quit,
        _ => println!("{}", HELP),
    }
    Flow::Continue
}
