//! kms-splash - show a built-in picture on a Linux display
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          Lifecycle Controller            │
//! ├──────────────────────────────────────────┤
//! │  Connector catalog → Preferred mode      │
//! │                          ↓               │
//! │  Dumb buffer + framebuffer → mmap        │
//! │                          ↓               │
//! │  SetCrtc (master held briefly)           │
//! │                          ↓               │
//! │  sigwait(SIGINT|SIGTERM) → restore       │
//! └──────────────────────────────────────────┘
//! ```

mod config;
mod constants;
mod drm;
mod error;
mod lifecycle;
mod shutdown;

use anyhow::{Context, Result};
use log::{debug, info, LevelFilter};
use std::path::Path;
use std::process::ExitCode;

use crate::drm::{find_connector, list_connectors, select_preferred_mode, Device};
use crate::lifecycle::LifecycleController;
use crate::shutdown::SignalWaiter;

/// Raw pixels supplied by the image build step (see build.rs)
static PICTURE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/picture.bin"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Acquire the display, show the picture, wait, release
    Show,
    /// `-l`: list connectors and object ids
    List,
    /// `-r`: print the preferred resolution of the configured connector
    Resolution,
    /// `-h`: usage
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Options {
    command: Command,
    verbose: bool,
}

impl Options {
    /// getopt-style "lrhv": flags may be grouped, unknown ones are ignored
    /// and `-h` wins as soon as it is seen.
    fn parse<S: AsRef<str>>(args: &[S]) -> Self {
        let mut list = false;
        let mut resolution = false;
        let mut verbose = false;

        for arg in args {
            let arg = arg.as_ref();
            if arg == "--" {
                break;
            }
            if arg == "--help" {
                return Self {
                    command: Command::Help,
                    verbose,
                };
            }
            let Some(flags) = arg.strip_prefix('-') else {
                continue;
            };
            if flags.starts_with('-') {
                continue;
            }
            for flag in flags.chars() {
                match flag {
                    'l' => list = true,
                    'r' => resolution = true,
                    'v' => verbose = true,
                    'h' => {
                        return Self {
                            command: Command::Help,
                            verbose,
                        }
                    }
                    _ => {}
                }
            }
        }

        let command = if list {
            Command::List
        } else if resolution {
            Command::Resolution
        } else {
            Command::Show
        };
        Self { command, verbose }
    }
}

/// Print help message
fn print_help() {
    println!(
        r#"
kms-splash {} [OPTIONS...]

Show the built-in picture on the framebuffer

  -l list connectors
  -r get resolution dri device and connector needs to be set
  -v do more verbose printing
  -h show this message

CONFIG FILE:
    {}
"#,
        env!("CARGO_PKG_VERSION"),
        constants::SYSTEM_CONFIG_PATH
    );
}

/// `-l`
fn list_resources(device_path: &Path) -> Result<()> {
    let device = Device::open(device_path)?;
    let listing = list_connectors(&device)?;
    print!("{}", listing);
    Ok(())
}

/// `-r`
fn print_resolution(device_path: &Path, connector_name: &str) -> Result<()> {
    let device = Device::open(device_path)?;
    let connector = find_connector(&device, connector_name)?;
    let mode = select_preferred_mode(&connector)?;
    let (width, height) = mode.size();
    println!("{}x{}", width, height);
    Ok(())
}

/// Default command
fn show_picture(device_path: &Path, connector_name: &str) -> Result<()> {
    // Block the signals before acquiring anything so an early Ctrl+C is
    // only seen once the display can be released cleanly
    let waiter = SignalWaiter::install()?;

    let mut controller = LifecycleController::new(connector_name);
    let cause = controller
        .run(|| Device::open(device_path), PICTURE, &waiter)
        .with_context(|| format!("Could not show picture on {}", connector_name))?;

    debug!(
        "Stopped by {}, now {:?} (path {:?})",
        cause,
        controller.state(),
        controller.history()
    );
    Ok(())
}

fn run(options: &Options) -> Result<ExitCode> {
    if options.command == Command::Help {
        print_help();
        return Ok(ExitCode::from(1));
    }

    let config = config::Config::load();
    let device_path = config.display.device.as_path();
    let connector = config.display.connector.as_str();

    match options.command {
        Command::List => list_resources(device_path)?,
        Command::Resolution => print_resolution(device_path, connector)?,
        Command::Show => show_picture(device_path, connector)?,
        Command::Help => unreachable!("handled above"),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = Options::parse(&args);

    let level = if options.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Stdout)
        .init();

    info!("kms-splash starting...");

    match run(&options) {
        Ok(code) => code,
        Err(e) => {
            println!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
