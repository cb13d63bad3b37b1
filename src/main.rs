use std::env;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{error, info, LevelFilter};

use simcat::console::{Console, Events};
use simcat::{BreakpointStore, DebugSession, DisplayPublisher, MessageSink, SessionConfig};

/// SIMCAT - debugger client for remote program simulators
fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("simcat", String::as_str);

    let options = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(program);
            process::exit(1);
        }
    };

    let Some(database) = options.database else {
        eprintln!("Please indicate a debug database file");
        print_usage(program);
        process::exit(1);
    };

    simcat::init_logging(options.log_level);
    info!("Starting SIMCAT v{}", simcat::VERSION);

    if !Path::new(&database).is_file() {
        eprintln!("{} does not exist", database);
        process::exit(1);
    }

    let store = match BreakpointStore::open(&database) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("{}", e);
            eprintln!("Cannot open debug database: {}", e);
            process::exit(1);
        }
    };

    let events = Events::new();
    let publisher: Arc<dyn DisplayPublisher> = Arc::new(events.sender());
    let sink: Arc<dyn MessageSink> = Arc::new(events.sender());

    let session = DebugSession::start(&options.config, store, publisher, sink)
        .context("starting debug session")?;

    let mut console = Console::new(session, io::stdout(), true);
    console.load_initial_files()?;
    console.run(&events)?;
    console.into_output();

    info!("SIMCAT exiting");
    Ok(())
}

/// Parsed command line
struct Options {
    config: SessionConfig,
    database: Option<String>,
    log_level: LevelFilter,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        config: SessionConfig::default(),
        database: None,
        log_level: LevelFilter::Info,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--version" => {
                println!("SIMCAT v{}", simcat::VERSION);
                println!("{}", simcat::PKG_DESCRIPTION);
                process::exit(0);
            }
            "-h" | "--help" => {
                print_usage("simcat");
                process::exit(0);
            }
            "-d" | "--debug" => options.log_level = LevelFilter::Debug,
            "-H" | "--host" => options.config.simulator_host = value(&mut iter, arg)?,
            "-p" | "--port" => options.config.simulator_port = port(&mut iter, arg)?,
            "-c" | "--callback-port" => options.config.callback_port = port(&mut iter, arg)?,
            "--bind" => options.config.callback_bind = value(&mut iter, arg)?,
            "--advertise" => options.config.advertise_host = value(&mut iter, arg)?,
            "-t" | "--timeout-ms" => {
                let raw = value(&mut iter, arg)?;
                let ms = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| anyhow!("Invalid timeout: {}", raw))?;
                options.config.request_timeout = Duration::from_millis(ms);
            }
            flag if flag.starts_with('-') => return Err(anyhow!("Unknown option: {}", flag)),
            path => {
                if options.database.is_some() {
                    return Err(anyhow!("Only one debug database may be given"));
                }
                options.database = Some(path.to_string());
            }
        }
    }

    Ok(options)
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn port<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<u16> {
    let raw = value(iter, flag)?;
    raw.parse::<u16>()
        .map_err(|_| anyhow!("Invalid port for {}: {}", flag, raw))
}

/// Print usage information
fn print_usage(program_name: &str) {
    println!("SIMCAT - debugger client for remote program simulators");
    println!("Usage: {} [options] <debug.db>", program_name);
    println!();
    println!("Options:");
    println!("  -H, --host <host>           Simulator host (default: localhost)");
    println!("  -p, --port <port>           Simulator port (default: 8888)");
    println!("  -c, --callback-port <port>  Port for breakpoint notifications (default: 8889)");
    println!("      --bind <addr>           Address the callback listener binds (default: 0.0.0.0)");
    println!("      --advertise <host>      Host sent to the simulator (default: 0.0.0.0)");
    println!("  -t, --timeout-ms <ms>       Simulator request timeout (default: 5000)");
    println!("  -d, --debug                 Verbose logging");
    println!("  -h, --help                  Display this help message");
    println!("  -v, --version               Display version information");
    println!();
    println!("Type 'help' at the (simcat) prompt for console commands.");
}
