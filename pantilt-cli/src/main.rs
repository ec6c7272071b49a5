// pantilt command line interface
// Runs the tracking loop on the simulated rig and manages configuration

mod scenario;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pantilt_core::config::{ControlLawKind, TrackerConfig};
use pantilt_eye::{ScriptedDetector, SyntheticCamera, TrackingCoordinator};
use pantilt_servo::SimulatedServoDriver;
use scenario::Scenario;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pantilt")]
#[command(about = "Pan-tilt pet tracking camera control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking loop against the simulated camera, detector and servos
    Simulate {
        /// Scenario file (JSON); defaults to a built-in wandering pet
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Seconds between status reports
        #[arg(long, default_value = "5")]
        status_interval: u64,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Control law override (proportional, pid)
        #[arg(long)]
        law: Option<String>,

        /// Drop every Nth camera frame
        #[arg(long, default_value = "0")]
        drop_every: u64,

        /// Sweep both servo axes once before tracking
        #[arg(long)]
        servo_test: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Check a configuration file
    Validate {
        /// File to validate
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    init_logging(&config.logging.level, config.logging.json);

    match cli.command {
        Commands::Simulate {
            scenario,
            status_interval,
            duration,
            law,
            drop_every,
            servo_test,
        } => {
            if let Some(law) = law {
                config.control.law = parse_law(&law)?;
            }
            config.validate()?;
            let options = SimulateOptions {
                scenario,
                status_interval: Duration::from_secs(status_interval.max(1)),
                duration: duration.map(Duration::from_secs),
                drop_every,
                servo_test,
            };
            simulate(config, options).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigAction::Validate { file } => {
                let config = TrackerConfig::from_file(&file)
                    .with_context(|| format!("failed to load {}", file.display()))?;
                config.validate()?;
                println!("✅ {} is valid", file.display());
                Ok(())
            }
        },
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TrackerConfig> {
    let mut config = match path {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .init();
    }
}

fn parse_law(name: &str) -> Result<ControlLawKind> {
    match name.to_ascii_lowercase().as_str() {
        "proportional" | "p" | "simple-p" => Ok(ControlLawKind::Proportional),
        "pid" => Ok(ControlLawKind::Pid),
        other => bail!("unknown control law '{}' (expected proportional or pid)", other),
    }
}

struct SimulateOptions {
    scenario: Option<PathBuf>,
    status_interval: Duration,
    duration: Option<Duration>,
    drop_every: u64,
    servo_test: bool,
}

async fn simulate(config: TrackerConfig, options: SimulateOptions) -> Result<()> {
    let scenario = match &options.scenario {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::wandering(config.camera.width, config.camera.height),
    };
    let looping = scenario.looping;
    let script = scenario.into_script()?;
    info!("Simulating {} scripted frames (looping: {})", script.len(), looping);

    let camera = SyntheticCamera::new(&config.camera).with_dropped_frames(options.drop_every);
    let mut detector = ScriptedDetector::new(script);
    if looping {
        detector = detector.looping();
    }

    let mut coordinator = TrackingCoordinator::new(
        config,
        Box::new(camera),
        Box::new(detector),
        Box::new(SimulatedServoDriver::new()),
    )?;
    coordinator.initialize()?;
    if options.servo_test {
        coordinator.guard().self_test(1)?;
    }
    coordinator.start()?;
    info!("🎯 Tracking started. Press Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(options.status_interval);
    ticker.tick().await;

    let deadline = async {
        match options.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = coordinator.get_status();
                info!("📊 {}", status);
                if !status.is_running {
                    warn!("Tracking loop is no longer running");
                    break;
                }
            }
            _ = &mut deadline => {
                info!("Simulation duration reached");
                break;
            }
            _ = &mut shutdown => break,
        }
    }

    let stats = tokio::task::block_in_place(|| coordinator.stop());
    match stats {
        Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
        None => warn!("No final statistics (worker did not exit in time)"),
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_law() {
        assert_eq!(parse_law("PID").unwrap(), ControlLawKind::Pid);
        assert_eq!(parse_law("proportional").unwrap(), ControlLawKind::Proportional);
        assert!(parse_law("bang-bang").is_err());
    }

    #[test]
    fn test_cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "pantilt",
            "simulate",
            "--duration",
            "3",
            "--law",
            "pid",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Simulate { duration, law, .. } => {
                assert_eq!(duration, Some(3));
                assert_eq!(law.as_deref(), Some("pid"));
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_cli_parses_config_validate() {
        let cli = Cli::try_parse_from(["pantilt", "config", "validate", "rig.toml"]).unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::Validate { file },
            } => assert_eq!(file, PathBuf::from("rig.toml")),
            _ => panic!("expected config validate"),
        }
    }

    #[test]
    fn test_load_default_config() {
        let config = load_config(None).unwrap();
        assert!(config.validate().is_ok());
    }
}
