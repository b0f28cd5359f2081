//! LS9 Remote - command-line front end
//!
//! Read, write, fade and watch Yamaha LS9 parameters over MIDI SysEx.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod cli;

use ls9_remote::mixer::CHANNEL_NAME_ELEMENT;
use ls9_remote::{AppConfig, MemoryTransport, MidiTransport, Mixer, Parameter, Transport, Value};

/// LS9 Remote - control a Yamaha LS9 over MIDI SysEx
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LS9_CONFIG", default_value = "ls9.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// MIDI port name substring (overrides the config file)
    #[arg(short, long, env = "LS9_PORT")]
    port: Option<String>,

    /// Read timeout in milliseconds (overrides the config file)
    #[arg(long, env = "LS9_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Talk to a simulated desk instead of a MIDI port
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available MIDI ports
    ListPorts,
    /// Read a parameter (element:index:channel)
    Get { param: Parameter },
    /// Write a parameter
    Set {
        param: Parameter,
        #[arg(allow_hyphen_values = true)]
        value: Value,
    },
    /// Ramp a parameter from its current value to a target
    Fade {
        param: Parameter,
        #[arg(allow_hyphen_values = true)]
        target: Value,
        /// Ramp duration in milliseconds
        #[arg(short, long, default_value = "1000")]
        duration_ms: u64,
    },
    /// Print every parameter change until interrupted
    Watch {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Wait for the next parameter moved on the desk
    Touch,
    /// Read an input channel name
    Name { channel: u16 },
    /// Interactive shell
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let file_config = AppConfig::read_if_exists(&args.config).await?;
    let config_found = file_config.is_some();
    let mut config = file_config.unwrap_or_default();
    if let Some(port) = &args.port {
        config.midi.port = port.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.timeouts.read_ms = ms;
    }
    config.validate()?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = init_logging(
        &level,
        args.json_logs || config.logging.json,
        config.logging.file.as_deref(),
    )?;

    info!("Starting LS9 Remote...");
    if config_found {
        info!("Configuration file: {}", args.config);
    } else {
        info!("No config file at {}, using defaults", args.config);
    }

    if let Command::ListPorts = args.command {
        return list_ports(&config);
    }

    let simulated = args.simulate.then(|| Arc::new(simulated_desk()));
    let transport: Arc<dyn Transport> = match &simulated {
        Some(desk) => {
            info!("Using simulated desk");
            desk.clone() as Arc<dyn Transport>
        }
        None => {
            let midi = MidiTransport::open(&config.midi.client_name, &config.midi.port)
                .with_context(|| format!("Failed to open MIDI port '{}'", config.midi.port))?;
            info!("Connected to {}", midi.port_name());
            Arc::new(midi)
        }
    };

    let mixer = Mixer::new(transport).with_fade_config(config.fade_config());

    match args.command {
        Command::ListPorts => {}
        Command::Get { param } => {
            let value = mixer.get(param, config.read_timeout()).await?;
            println!("{}", value);
        }
        Command::Set { param, value } => {
            mixer.set(param, value)?;
            info!("{} <- {}", param, value);
        }
        Command::Fade {
            param,
            target,
            duration_ms,
        } => {
            let duration = Duration::from_millis(duration_ms);
            mixer
                .fade(param, target, duration, config.read_timeout())
                .await?;
            // The ramp runs detached; stay alive until its final write
            tokio::time::sleep(duration + config.fade_config().tick * 2).await;
            info!("Fade of {} to {} complete", param, target);
        }
        Command::Watch { json } => {
            if let Some(desk) = &simulated {
                spawn_simulated_operator(desk.clone());
            }
            mixer.add_global_listener(move |param, value| print_change(param, value, json));
            println!("{}", "Watching for changes (Ctrl+C to stop)".dimmed());
            shutdown_signal().await;
        }
        Command::Touch => {
            if let Some(desk) = &simulated {
                spawn_simulated_operator(desk.clone());
            }
            let param = mixer.next_param_touched(config.touch_timeout()).await?;
            println!("{}", param);
        }
        Command::Name { channel } => {
            let name = mixer.channel_name(channel, config.read_timeout()).await?;
            println!("{}", name);
        }
        Command::Repl => {
            if let Some(desk) = &simulated {
                spawn_simulated_operator(desk.clone());
            }
            cli::run_repl(&mixer, &config).await?;
        }
    }

    Ok(())
}

fn init_logging(level: &str, json: bool, file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so command output stays pipeable
    let stderr_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown signal received");
}

fn list_ports(config: &AppConfig) -> Result<()> {
    let ports = MidiTransport::list_ports(&config.midi.client_name)?;
    let wanted = config.midi.port.to_lowercase();

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    for (title, names) in [("Input Ports:", &ports.inputs), ("Output Ports:", &ports.outputs)] {
        println!("\n{}", title.bold());
        if names.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for name in names {
            if name.to_lowercase().contains(&wanted) {
                println!("  {} {}", "[MATCH]".green(), name.bright_white());
            } else {
                println!("          {}", name);
            }
        }
    }
    println!();
    Ok(())
}

fn print_change(param: Parameter, value: Value, json: bool) {
    let now = chrono::Local::now();
    if json {
        let line = serde_json::json!({
            "time": now.to_rfc3339(),
            "element": param.element,
            "index": param.index,
            "channel": param.channel,
            "value": value,
        });
        println!("{}", line);
    } else {
        println!(
            "{} {} = {}",
            format!("[{}]", now.format("%H:%M:%S%.3f")).dimmed(),
            param.to_string().cyan(),
            value.to_string().green()
        );
    }
}

/// Input faders level element
const FADER_ELEMENT: u16 = 51;
const SIMULATED_CHANNELS: u16 = 64;

/// Desk answering requests for fader levels and channel names
fn simulated_desk() -> MemoryTransport {
    let faders = (0..SIMULATED_CHANNELS).map(|ch| (Parameter::new(FADER_ELEMENT, 0, ch), 0));
    let names = (0..SIMULATED_CHANNELS).flat_map(|ch| {
        let name = format!("CH{:<4}", ch + 1);
        let bytes = name.as_bytes();
        let head = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let tail = u32::from_be_bytes([bytes[4], bytes[5], 0, 0]);
        [
            (Parameter::new(CHANNEL_NAME_ELEMENT, 0, ch), Value::from(head)),
            (Parameter::new(CHANNEL_NAME_ELEMENT, 1, ch), Value::from(tail)),
        ]
    });
    MemoryTransport::with_device(faders.chain(names))
}

/// Move a fader on the simulated desk every few hundred milliseconds
fn spawn_simulated_operator(desk: Arc<MemoryTransport>) {
    tokio::spawn(async move {
        let mut step: i64 = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(750)).await;
            step += 1;
            let channel = (step % 4) as u16;
            let value = (step * 97) % 1024 - 512;
            desk.touch(Parameter::new(FADER_ELEMENT, 0, channel), value);
        }
    });
}
