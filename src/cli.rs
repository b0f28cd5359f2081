//! Command-line interface and REPL

use anyhow::{anyhow, bail, Result};
use colored::*;
use rustyline::DefaultEditor;
use std::time::Duration;

use ls9_remote::{AppConfig, Mixer, Parameter, Value};

const HELP: &str = "\
Commands:
  get <e:i:c>                      read a parameter
  set <e:i:c> <value>              write a parameter
  fade <e:i:c> <target> [ms]       ramp a parameter (default 1000 ms)
  name <channel>                   read an input channel name
  touch                            wait for the next parameter moved on the desk
  help                             show this help
  exit | quit                      leave";

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Get(Parameter),
    Set(Parameter, Value),
    Fade {
        param: Parameter,
        target: Value,
        duration: Duration,
    },
    Name(u16),
    Touch,
    Help,
    Quit,
}

/// Parse a REPL line, `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("get", [param]) => ReplCommand::Get(param.parse()?),
        ("set", [param, value]) => ReplCommand::Set(param.parse()?, parse_value(value)?),
        ("fade", [param, target]) => ReplCommand::Fade {
            param: param.parse()?,
            target: parse_value(target)?,
            duration: Duration::from_millis(1000),
        },
        ("fade", [param, target, ms]) => ReplCommand::Fade {
            param: param.parse()?,
            target: parse_value(target)?,
            duration: Duration::from_millis(
                ms.parse().map_err(|_| anyhow!("invalid duration '{}'", ms))?,
            ),
        },
        ("name", [channel]) => ReplCommand::Name(
            channel
                .parse()
                .map_err(|_| anyhow!("invalid channel '{}'", channel))?,
        ),
        ("touch", []) => ReplCommand::Touch,
        ("help", []) => ReplCommand::Help,
        ("exit" | "quit", []) => ReplCommand::Quit,
        _ => bail!("unknown command '{}' (type 'help')", line.trim()),
    };

    Ok(Some(command))
}

fn parse_value(s: &str) -> Result<Value> {
    s.parse().map_err(|_| anyhow!("invalid value '{}'", s))
}

pub async fn run_repl(mixer: &Mixer, config: &AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Type 'help' for commands".dimmed());

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline("ls9> "));
        let line = match readline {
            Ok(line) => line,
            Err(_) => break,
        };
        let _ = rl.add_history_entry(line.as_str());

        match parse_command(&line) {
            Ok(Some(ReplCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(mixer, config, command).await {
                    println!("{} {}", "error:".red().bold(), e);
                }
            }
            Ok(None) => {}
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        }
    }

    Ok(())
}

async fn execute(mixer: &Mixer, config: &AppConfig, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Get(param) => {
            let value = mixer.get(param, config.read_timeout()).await?;
            println!("{} = {}", param.to_string().cyan(), value.to_string().green());
        }
        ReplCommand::Set(param, value) => {
            mixer.set(param, value)?;
            println!("{} <- {}", param.to_string().cyan(), value.to_string().yellow());
        }
        ReplCommand::Fade {
            param,
            target,
            duration,
        } => {
            mixer
                .fade(param, target, duration, config.read_timeout())
                .await?;
            println!(
                "{} fading to {} over {} ms",
                param.to_string().cyan(),
                target.to_string().yellow(),
                duration.as_millis()
            );
        }
        ReplCommand::Name(channel) => {
            let name = mixer.channel_name(channel, config.read_timeout()).await?;
            println!("channel {} = {}", channel, format!("\"{}\"", name).green());
        }
        ReplCommand::Touch => {
            println!("{}", "Move a control on the desk...".dimmed());
            let param = mixer.next_param_touched(config.touch_timeout()).await?;
            println!("touched {}", param.to_string().cyan());
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
    Ok(())
}
