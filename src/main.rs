//! USB request block analyzer - CLI entry point.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, debug};
use ratatui::prelude::*;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::Duration;

use urbtap::analyzer::{Interfaces, Phase, UrbAnalyzer};
use urbtap::config::{Config, example_config};
use urbtap::hexdump;
use urbtap::registry::EndpointRegistry;
use urbtap::roothub::RootHubs;
use urbtap::sink::{CollectSink, LogSink, RecordSink, Tee};
use urbtap::trace::{Replay, Trace, parse_hex};
use urbtap::ui::{App, render};
use urbtap::urb::{Urb, UrbBody};
use urbtap::{TransferRecord, logger};

#[derive(Parser)]
#[command(name = "urbtap")]
#[command(about = "USB request block analyzer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: auto-detect)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print one line per record
    Replay {
        trace: PathBuf,

        /// Stop at the first event that fails to parse
        #[arg(long)]
        strict: bool,
    },

    /// Replay a trace and print the endpoint registry of each root hub
    Endpoints { trace: PathBuf },

    /// Hex and text dump of bytes
    Dump {
        /// Hex bytes (whitespace and ':' ignored)
        hex: String,
    },

    /// Parse a single request and print what it contains
    Decode {
        /// Hex bytes of the request
        hex: String,

        /// Leg the request was observed on
        #[arg(long, value_enum, default_value_t = PhaseArg::Complete)]
        phase: PhaseArg,
    },

    /// Browse a replayed trace interactively
    Tui { trace: PathBuf },

    /// Print blank example config file
    InitConfig,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Submit,
    Complete,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Submit => Phase::Submit,
            PhaseArg::Complete => Phase::Complete,
        }
    }
}

/// Prints each record as it is produced.
struct PrintSink;

impl RecordSink for PrintSink {
    fn emit(&mut self, root_hub: u8, record: &TransferRecord<'_>) {
        println!("usb{:<3} {}", root_hub, record);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions early (doesn't need config)
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "urbtap", &mut std::io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::load()?,
    };

    let level = logger::raise(config.settings.level_filter()?, cli.verbose);
    logger::init(level)?;
    debug!("Log level {}", level);

    match cli.command {
        Commands::Replay { trace, strict } => {
            let trace = load_trace(&trace)?;
            let mut hubs = root_hubs(&config);
            let mut sink = Tee(PrintSink, LogSink);
            let stats = Replay::new(&trace)
                .strict(strict)
                .run(&mut hubs, &mut sink)?;
            eprintln!(
                "{} events, {} records, {} malformed",
                stats.events, stats.records, stats.malformed
            );
        }
        Commands::Endpoints { trace } => {
            let trace = load_trace(&trace)?;
            let mut hubs = root_hubs(&config);
            Replay::new(&trace).run(&mut hubs, &mut LogSink)?;
            print_endpoints(&hubs, &config);
        }
        Commands::Dump { hex } => {
            let bytes = parse_hex(&hex)?;
            for line in hexdump::dump_lines(&bytes, 16) {
                println!("{}", line);
            }
        }
        Commands::Decode { hex, phase } => {
            let bytes = parse_hex(&hex)?;
            print_decoded(&bytes, phase.into(), &config)?;
        }
        Commands::Tui { trace } => {
            let trace = load_trace(&trace)?;
            let mut hubs = root_hubs(&config);
            let mut sink = CollectSink::new(config.settings.max_capture_bytes);
            Replay::new(&trace).run(&mut hubs, &mut sink)?;
            run_tui(App::new(sink.records, &hubs, config), level)?;
        }
        Commands::InitConfig => {
            print!("{}", example_config());
        }
        Commands::Completions { .. } => {
            // Handled above before loading config
            unreachable!()
        }
    }

    Ok(())
}

fn load_trace(path: &Path) -> Result<Trace> {
    Trace::load(path).with_context(|| format!("loading trace {}", path.display()))
}

fn root_hubs(config: &Config) -> RootHubs {
    RootHubs::new(config.settings.registry_capacity).with_buffer_dumps(config.settings.dump_buffers)
}

fn print_endpoints(hubs: &RootHubs, config: &Config) {
    if hubs.is_empty() {
        println!("No root hubs seen");
        return;
    }

    for (root_hub, registry) in hubs.iter() {
        println!("=== Root hub usb{} ({} endpoints) ===", root_hub, registry.len());
        for endpoint in registry.snapshot() {
            let label = config
                .pipe_label(endpoint.pipe)
                .map(|l| format!("  {}", l))
                .unwrap_or_default();
            println!("  {}  {}{}", endpoint.pipe, endpoint, label);
        }
        println!();
    }
}

fn print_decoded(bytes: &[u8], phase: Phase, config: &Config) -> Result<()> {
    let urb = Urb::parse(bytes)?;
    let header = &urb.header;

    println!("Function:  {} ({:#06x})", header.function, header.function.code());
    println!("Length:    {}", header.length);
    println!("Status:    {:#010x}", header.status);
    println!("Device:    {:#018x}", header.device_handle);

    if let UrbBody::SelectConfiguration(select) = &urb.body {
        println!("Interfaces:");
        for interface in Interfaces::new(select.interfaces) {
            let interface = match interface {
                Ok(interface) => interface,
                Err(err) => {
                    println!("  malformed: {}", err);
                    break;
                }
            };
            println!(
                "  #{} alt {} class {:02x}:{:02x}:{:02x} ({} pipes)",
                interface.number,
                interface.alternate_setting,
                interface.class,
                interface.subclass,
                interface.protocol,
                interface.pipe_count()
            );
            for pipe in interface.pipes() {
                match pipe {
                    Ok(pipe) => println!(
                        "    {}  EP{:02X} {} max packet {} interval {}",
                        pipe.handle,
                        pipe.endpoint_address,
                        pipe.transfer_type,
                        pipe.max_packet_size,
                        pipe.interval
                    ),
                    Err(err) => println!("    malformed: {}", err),
                }
            }
        }
    }

    let registry = EndpointRegistry::with_capacity(config.settings.registry_capacity);
    let record = UrbAnalyzer::new(&registry)
        .with_buffer_dumps(config.settings.dump_buffers)
        .analyze(&urb, phase);
    println!("Record:    {}", record);

    if let Some(buffer) = &record.buffer {
        println!("Buffer:");
        for line in hexdump::dump_lines(buffer, 16) {
            println!("  {}", line);
        }
    }

    Ok(())
}

fn run_tui(mut app: App, level: LevelFilter) -> Result<()> {
    // Stderr logging would draw over the alternate screen
    log::set_max_level(LevelFilter::Off);

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| render(f, &app))?;

        if event::poll(Duration::from_millis(250))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('j') | KeyCode::Down => {
                    app.move_selection(1);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.move_selection(-1);
                }
                KeyCode::Char('g') | KeyCode::Home => {
                    app.goto_top();
                }
                KeyCode::Char('G') | KeyCode::End => {
                    app.goto_bottom();
                }
                KeyCode::Char('e') => {
                    app.toggle_view_mode();
                }
                KeyCode::Char('?') => {
                    app.show_help = !app.show_help;
                }
                KeyCode::Esc => {
                    if app.show_help {
                        app.show_help = false;
                    }
                }
                KeyCode::PageUp | KeyCode::Char('K') => {
                    app.scroll_details_up();
                }
                KeyCode::PageDown | KeyCode::Char('J') => {
                    app.scroll_details_down();
                }
                _ => {}
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    log::set_max_level(level);

    Ok(())
}
