use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use live_interpreter::api;
use live_interpreter::demo::script::council_meeting;
use live_interpreter::demo::speech::PacedSpeaker;
use live_interpreter::demo::translate::LookupTranslator;
use live_interpreter::demo::{DemoController, DemoOptions, DemoTransport};
use live_interpreter::playback::{default_player, PlaybackQueue};
use live_interpreter::protocol::SessionConfig;
use live_interpreter::session::{self, SessionHandle, SessionOptions};
use live_interpreter::settings::{self, Settings};
use live_interpreter::state::AppEvent;
use live_interpreter::transport::WsTransport;
use std::io::BufRead;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "live-interpreter", version, about = "Real-time speech interpreter client")]
struct Cli {
    /// Websocket endpoint of the interpreter server.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Spoken language, or "auto" to let the server detect it.
    #[arg(long, global = true)]
    source: Option<String>,

    /// Translation target; repeat for up to three.
    #[arg(long = "target", global = true)]
    targets: Vec<String>,

    #[arg(long, global = true)]
    no_playback: bool,

    #[arg(long, global = true)]
    reconnect_delay_ms: Option<u64>,

    /// Persist the flags above as the new defaults.
    #[arg(long, global = true)]
    save: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the server and interpret (default).
    Run,
    /// Replay a scripted meeting without a server.
    Demo {
        #[arg(long, default_value_t = 3000)]
        line_delay_ms: u64,
        /// Skip simulated speech after each line.
        #[arg(long)]
        no_speech: bool,
    },
    /// Check the server's health endpoint.
    Health,
    /// List the languages and voices the server supports.
    Languages,
    /// Print the settings file location and contents.
    Settings,
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) -> anyhow::Result<()> {
    if let Some(url) = &cli.url {
        settings.server_url = url.clone();
    }
    if let Some(source) = &cli.source {
        settings.session.source_language = (source != "auto").then(|| source.clone());
    }
    if !cli.targets.is_empty() {
        settings.session.target_languages = cli.targets.clone();
    }
    if cli.no_playback {
        settings.playback_enabled = false;
    }
    if let Some(ms) = cli.reconnect_delay_ms {
        settings.reconnect_delay_ms = ms;
    }
    if let Err(e) = settings.session.validate() {
        bail!("invalid language selection: {}", e);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = settings::load();
    apply_overrides(&cli, &mut settings)?;
    if cli.save {
        settings::save(&settings).map_err(anyhow::Error::msg)?;
        log::info!("[main] settings saved");
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_session(&runtime, &settings, None),
        Command::Demo {
            line_delay_ms,
            no_speech,
        } => {
            let options = DemoOptions {
                line_delay: Duration::from_millis(line_delay_ms),
                ..DemoOptions::default()
            };
            run_session(&runtime, &settings, Some((options, !no_speech)))
        }
        Command::Health => {
            let health = runtime.block_on(api::fetch_health(&settings.server_url))?;
            println!(
                "{} (version {}, region {}, live interpreter {})",
                health.status,
                health.version,
                health.azure_region,
                if health.live_interpreter_enabled { "on" } else { "off" }
            );
            Ok(())
        }
        Command::Languages => {
            let catalog = runtime.block_on(api::fetch_languages(&settings.server_url))?;
            for (code, name) in &catalog.languages {
                match catalog.default_voice(code) {
                    Some(voice) => println!("{:<8} {:<28} {}", code, name, voice),
                    None => println!("{:<8} {}", code, name),
                }
            }
            Ok(())
        }
        Command::Settings => {
            let path = settings::settings_path().map_err(anyhow::Error::msg)?;
            println!("{}", path.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn run_session(
    runtime: &tokio::runtime::Runtime,
    settings: &Settings,
    demo: Option<(DemoOptions, bool)>,
) -> anyhow::Result<()> {
    let _guard = runtime.enter();
    let (event_tx, event_rx) = std::sync::mpsc::channel::<AppEvent>();
    let playback = settings
        .playback_enabled
        .then(|| PlaybackQueue::spawn(default_player(), Some(event_tx.clone())));
    let options = SessionOptions::from(settings);

    let mut controller = None;
    let (handle, task) = match demo {
        Some((demo_options, speak)) => session::spawn(
            |tx| {
                let mut transport = DemoTransport::new(
                    tx,
                    council_meeting(),
                    Arc::new(LookupTranslator::council_meeting()),
                    demo_options,
                );
                if speak {
                    transport = transport.with_speaker(Arc::new(PacedSpeaker::default()));
                }
                controller = Some(transport.controller());
                transport
            },
            options,
            event_tx,
            playback,
        ),
        None => session::spawn(WsTransport::new, options, event_tx, playback),
    };

    std::thread::spawn(move || render_events(event_rx));
    print_help(controller.is_some());

    read_commands(&handle, settings.session.clone(), controller.as_ref())?;

    let _ = handle.shutdown();
    if let Err(e) = runtime.block_on(task) {
        log::error!("[main] session task failed: {}", e);
    }
    Ok(())
}

fn print_help(demo: bool) {
    println!("commands: start | stop | connect | disconnect | targets <lang>... | source <lang|auto> | quit");
    if demo {
        println!("demo:     pause | resume");
    }
}

fn read_commands(
    handle: &SessionHandle,
    mut config: SessionConfig,
    demo: Option<&DemoController>,
) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let result = match command {
            "start" => handle.start_recording(),
            "stop" => handle.stop_recording(),
            "connect" => handle.connect(),
            "disconnect" => handle.disconnect(),
            "targets" | "source" => {
                let mut next = config.clone();
                if command == "targets" {
                    next.target_languages = args;
                } else {
                    next.source_language = args.first().filter(|s| *s != "auto").cloned();
                }
                match next.validate() {
                    Ok(()) => {
                        config = next.clone();
                        handle.change_config(next)
                    }
                    Err(e) => {
                        println!("! {}", e);
                        Ok(())
                    }
                }
            }
            "pause" | "resume" if demo.is_some() => {
                if let Some(controller) = demo {
                    if command == "pause" {
                        controller.pause();
                    } else {
                        controller.resume();
                    }
                    println!("demo {}", if controller.is_paused() { "paused" } else { "running" });
                }
                Ok(())
            }
            "quit" | "exit" => break,
            "help" => {
                print_help(demo.is_some());
                Ok(())
            }
            other => {
                println!("unknown command '{}'", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("[main] {}", e);
            break;
        }
    }
    Ok(())
}

fn render_events(events: Receiver<AppEvent>) {
    let mut results = 0usize;
    while let Ok(event) = events.recv() {
        match event {
            AppEvent::ConnectionChanged(state) => println!("* connection: {}", state),
            AppEvent::RecordingChanged(state) => println!("* recording: {}", state),
            AppEvent::HandshakeComplete {
                message,
                server_version,
            } => match server_version {
                Some(version) => println!("* {} (server {})", message, version),
                None => println!("* {}", message),
            },
            AppEvent::ConfigConfirmed(config) => println!(
                "* config: {} -> {}",
                config.source_language.as_deref().unwrap_or("auto"),
                config.target_languages.join(", ")
            ),
            AppEvent::InterimUpdated(interim) => println!("  ... {}", interim.text),
            AppEvent::InterimCleared => {}
            AppEvent::ResultAppended(record) => {
                results += 1;
                let at = record
                    .timestamp_utc()
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| record.timestamp.clone());
                println!(
                    "#{} [{}] {} ({}, {}ms)",
                    results,
                    at,
                    record.original_text,
                    record.detected_language.as_deref().unwrap_or("?"),
                    record.duration_ms
                );
                for (lang, text) in &record.translations {
                    println!("    {}: {}", lang, text);
                }
            }
            AppEvent::AudioChunk(chunk) => log::debug!(
                "[main] audio chunk: {} base64 chars of {}",
                chunk.audio.len(),
                chunk.format
            ),
            AppEvent::ServerError(message) => println!("! server error: {}", message),
            AppEvent::ActionRejected(e) => println!("! {}", e),
            AppEvent::PlaybackFinished { language, error } => {
                if let Some(e) = error {
                    println!("! playback {} failed: {}", language, e);
                }
            }
        }
    }
}
