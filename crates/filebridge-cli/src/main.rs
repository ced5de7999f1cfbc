use std::path::PathBuf;
use std::process;

use anyhow::Context;
use filebridge::config::parse_seconds;
use filebridge::{
    BridgeClient, BridgeConfig, FILEBRIDGE_VERSION, ObjectKind, Params, Position, Reply,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_TIMED_OUT: i32 = 3;

#[derive(Debug, PartialEq)]
enum Invocation {
    Send {
        action: String,
        params: Params,
        wait: bool,
    },
    CreateObject {
        name: String,
        kind: ObjectKind,
        position: Option<Position>,
        components: Vec<String>,
    },
    DeleteObject {
        name: String,
    },
    SceneInfo,
}

/// What the command line asked for.
#[derive(Debug, PartialEq)]
enum Parsed {
    Version,
    Run(BridgeConfig, Invocation),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let (config, invocation) = match parse_args(&args, BridgeConfig::default()) {
        Ok(Parsed::Run(config, invocation)) => (config, invocation),
        Ok(Parsed::Version) => {
            println!("filebridge {FILEBRIDGE_VERSION}");
            return;
        }
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            print_usage();
            process::exit(EXIT_USAGE);
        }
    };

    init_tracing();

    match run(&config, invocation).await {
        Ok(Reply::Completed { response, .. }) => match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(EXIT_ERROR);
            }
        },
        Ok(Reply::NotRequested { id }) => println!("{id}"),
        Ok(Reply::TimedOut { id }) => {
            eprintln!(
                "error: no response to command {id} within {:.1}s",
                config.timeout.as_secs_f64()
            );
            process::exit(EXIT_TIMED_OUT);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(EXIT_ERROR);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: filebridge [options] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  send <action> [--params <json>] [--no-wait]");
    eprintln!("  create-object <name> [--type <type>] [--position <x,y,z>] [--component <name>]...");
    eprintln!("  delete-object <name>");
    eprintln!("  scene-info");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --commands-dir <dir>       Commands directory [default: AICommands]");
    eprintln!("  --responses-dir <dir>      Responses directory [default: AIResponses]");
    eprintln!("  --timeout <secs>           Seconds to wait for a response [default: 10]");
    eprintln!("  --poll-interval <secs>     Seconds between polls [default: 0.1]");
    eprintln!("  --version                  Print version");
}

/// Initialize tracing with FILEBRIDGE_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("FILEBRIDGE_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("filebridge={level},filebridge_cli={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String], mut config: BridgeConfig) -> Result<Parsed, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut params: Option<Params> = None;
    let mut wait = true;
    let mut kind = ObjectKind::default();
    let mut position: Option<Position> = None;
    let mut components: Vec<String> = Vec::new();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = |flag: &str| -> Result<String, String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{flag} requires a value"))
        };

        match arg {
            "--commands-dir" => config.commands_dir = PathBuf::from(value(arg)?),
            "--responses-dir" => config.responses_dir = PathBuf::from(value(arg)?),
            "--timeout" => {
                let raw = value(arg)?;
                config.timeout =
                    parse_seconds(&raw).ok_or_else(|| format!("invalid --timeout '{raw}'"))?;
            }
            "--poll-interval" => {
                let raw = value(arg)?;
                config.poll_interval = parse_seconds(&raw)
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| format!("invalid --poll-interval '{raw}'"))?;
            }
            "--params" => {
                let raw = value(arg)?;
                let parsed: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| format!("--params is not valid JSON: {e}"))?;
                match parsed {
                    serde_json::Value::Object(map) => params = Some(map),
                    _ => return Err("--params must be a JSON object".to_string()),
                }
            }
            "--no-wait" => wait = false,
            "--type" => kind = ObjectKind::from(value(arg)?.as_str()),
            "--position" => position = Some(value(arg)?.parse()?),
            "--component" => components.push(value(arg)?),
            "--version" | "-V" => return Ok(Parsed::Version),
            "--help" | "-h" => return Err("".to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown flag: {flag}")),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = positional.next().ok_or("missing command")?;
    let operand = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    let invocation = match command.as_str() {
        "send" => Invocation::Send {
            action: operand.ok_or("send requires an <action>")?,
            params: params.unwrap_or_default(),
            wait,
        },
        "create-object" => Invocation::CreateObject {
            name: operand.ok_or("create-object requires a <name>")?,
            kind,
            position,
            components,
        },
        "delete-object" => Invocation::DeleteObject {
            name: operand.ok_or("delete-object requires a <name>")?,
        },
        "scene-info" => match operand {
            None => Invocation::SceneInfo,
            Some(extra) => return Err(format!("unexpected argument: {extra}")),
        },
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(Parsed::Run(config, invocation))
}

async fn run(config: &BridgeConfig, invocation: Invocation) -> anyhow::Result<Reply> {
    let client = BridgeClient::new(config);

    let reply = match invocation {
        Invocation::Send {
            action,
            params,
            wait,
        } => client
            .send(&action, params, wait, config.timeout)
            .await
            .with_context(|| format!("sending '{action}'"))?,
        Invocation::CreateObject {
            name,
            kind,
            position,
            components,
        } => {
            let components: Vec<&str> = components.iter().map(String::as_str).collect();
            client
                .create_object(&name, kind, position, &components)
                .await
                .with_context(|| format!("creating '{name}'"))?
        }
        Invocation::DeleteObject { name } => client
            .delete_object(&name)
            .await
            .with_context(|| format!("deleting '{name}'"))?,
        Invocation::SceneInfo => client
            .get_scene_info()
            .await
            .context("querying scene info")?,
    };

    tracing::debug!(command_id = %reply.id(), "Exchange finished");
    Ok(reply)
}
