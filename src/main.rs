//! rawkey - print every key you press, in raw mode
//!
//! Puts the terminal into raw mode and prints one line per key: the byte value
//! and its name (`'a'`, `Ctrl-A`, `DEL`, ...). Press Ctrl-Q to quit. The
//! terminal is restored on every exit path: quit key, read error, `kill`
//! (SIGTERM/SIGHUP/SIGINT) or panic.
//!
//! # Quick Start
//!
//! ```text
//! rawkey                 # Ctrl-Q quits
//! rawkey -q x            # Ctrl-X quits
//! rawkey --show-timeouts # Also print a line for every 100 ms without input
//! ```

use std::env;
use std::io;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rawkey::app::{self, ExitReason};
use rawkey::config::{config_dir, Config as RawkeyConfig, QuitKey};
use rawkey::core::input::KeyReader;
use rawkey::core::mode::{install_panic_hook, TerminalModeController};
use rawkey::ui::{KeyMapper, KeyPrinter};

/// Command line options; `None` keeps the config file value
#[derive(Default)]
struct Options {
    quit_key: Option<String>,
    read_timeout_ms: Option<u32>,
    keep_output_processing: bool,
    no_color: bool,
    show_timeouts: bool,
    write_config: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("rawkey {}", VERSION);
}

fn print_help() {
    eprintln!("rawkey {} - raw-mode key reader", VERSION);
    eprintln!();
    eprintln!("Usage: rawkey [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -q, --quit <KEY>          Quit chord letter (default: q, i.e. Ctrl-Q)");
    eprintln!("  -t, --timeout <MS>        Read timeout in milliseconds (default: 100)");
    eprintln!("      --keep-output-processing");
    eprintln!("                            Leave output newline translation on");
    eprintln!("      --no-color            Do not highlight control chords");
    eprintln!("      --show-timeouts       Print a line for every read timeout");
    eprintln!("      --write-config        Write the effective config and exit");
    eprintln!("  -v, --version             Show version");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.rawkey/config.toml");
    eprintln!("Log file:      ~/.rawkey/rawkey.log (filter with RAWKEY_LOG)");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-q" | "--quit" => {
                i += 1;
                let value = args.get(i).ok_or("Missing quit key argument")?;
                if QuitKey::parse(value).is_none() {
                    return Err(format!("Invalid quit key: {}", value));
                }
                options.quit_key = Some(value.clone());
            }
            "-t" | "--timeout" => {
                i += 1;
                let value = args.get(i).ok_or("Missing timeout argument")?;
                let ms = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid timeout: {}", value))?;
                options.read_timeout_ms = Some(ms);
            }
            "--keep-output-processing" => {
                options.keep_output_processing = true;
            }
            "--no-color" => {
                options.no_color = true;
            }
            "--show-timeouts" => {
                options.show_timeouts = true;
            }
            "--write-config" => {
                options.write_config = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Merge command line options over the config file
fn apply_options(config: &mut RawkeyConfig, options: &Options) {
    if let Some(key) = &options.quit_key {
        config.quit_key = key.clone();
    }
    if let Some(ms) = options.read_timeout_ms {
        config.terminal.read_timeout_ms = ms;
    }
    if options.keep_output_processing {
        config.terminal.output_processing = true;
    }
    if options.no_color {
        config.display.color = false;
    }
    if options.show_timeouts {
        config.display.show_timeouts = true;
    }
}

/// Log to ~/.rawkey/rawkey.log; stderr is unusable while in raw mode
fn init_logging(config: &RawkeyConfig) {
    let log_path = config_dir()
        .map(|dir| dir.join("rawkey.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("rawkey.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("RAWKEY_LOG")
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> ExitCode {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    // Raw mode has ended by the time run() returns, so the diagnostic lands
    // on a cooked terminal.
    match run(options) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("rawkey: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(options: Options) -> anyhow::Result<ExitCode> {
    let (mut config, load_error) = RawkeyConfig::load();
    if let Some(e) = &load_error {
        // Still in cooked mode here
        eprintln!("rawkey: ignoring config file: {:#}", e);
    }
    apply_options(&mut config, &options);

    if options.write_config {
        let path = config.save()?;
        eprintln!("Wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(&config);
    info!("rawkey {} starting...", VERSION);
    if let Some(e) = load_error {
        warn!("Ignoring config file: {:#}", e);
    }

    let quit = config.quit_key();
    let shutdown = app::register_shutdown_signals().context("failed to install signal handlers")?;

    let controller = TerminalModeController::stdin(config.raw_mode_options())?;
    controller
        .capture_original()
        .context("standard input must be a terminal")?;
    install_panic_hook(controller.restore_hook());

    let mut reader = KeyReader::stdin()?;
    let mut printer = KeyPrinter::new(io::stdout(), config.printer_options());

    info!(
        "Quit key: {}, options: {:?}",
        KeyMapper::name(quit.byte),
        controller.options()
    );

    let reason = app::run_event_loop(&controller, &mut reader, &mut printer, quit, &shutdown)?;
    match reason {
        ExitReason::QuitKey => info!("Exiting on quit key"),
        ExitReason::Signal(signo) => warn!("Exiting on termination signal {}", signo),
    }
    Ok(ExitCode::from(reason.exit_code()))
}
