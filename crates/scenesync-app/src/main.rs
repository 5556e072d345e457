//! SceneSync terminal shell.
//!
//! Usage: `scenesync [/canvas/<id>[?viewOnly=true]] [--server ws://host:port/ws] [--config file.json]`

mod app;
mod commands;

use app::App;
use scenesync_core::{SceneAddress, SyncConfig};
use std::process::ExitCode;

#[derive(Debug, Default, PartialEq)]
struct Args {
    path: Option<String>,
    server: Option<String>,
    config: Option<String>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--server" => {
                    parsed.server = Some(args.next().ok_or("--server needs a URL")?);
                }
                "--config" => {
                    parsed.config = Some(args.next().ok_or("--config needs a file")?);
                }
                flag if flag.starts_with("--") => return Err(format!("Unknown flag {}", flag)),
                _ if parsed.path.is_none() => parsed.path = Some(arg.clone()),
                _ => return Err(format!("Unexpected argument {}", arg)),
            }
        }
        Ok(parsed)
    }
}

fn load_config(args: &Args) -> Result<SyncConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path, e))?;
            SyncConfig::from_json(&json).map_err(|e| format!("Invalid config {}: {}", path, e))?
        }
        None => SyncConfig::default(),
    };
    if let Some(server) = &args.server {
        config.server_url = Some(server.clone());
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let address = match SceneAddress::parse(args.path.as_deref().unwrap_or("/")) {
        Ok(address) => address,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if address.was_generated() {
        log::info!("Created new scene {}", address.path());
    }
    log::info!("Starting SceneSync at {}", address.path());
    commands::print_help();

    App::new(address, config).run();
    ExitCode::SUCCESS
}
