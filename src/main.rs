//! Hotkey Trainer - command line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hotkey_trainer::capture::{
    run_capture, CaptureController, CaptureEngine, CaptureError, CaptureHook, ShutdownSignal,
    ToggleCombo,
};
use hotkey_trainer::config::Config;
use hotkey_trainer::keyboard::{KeyLookup, Translator};
use hotkey_trainer::practice::{
    hint, ChordMatcher, DefinitionError, MatchEvent, ShortcutDefinition, TokenTail,
};
use hotkey_trainer::token::CanonicalToken;

#[cfg(target_os = "linux")]
use hotkey_trainer::keyboard::{EvdevHook, EvdevKeyLookup};

#[derive(Parser)]
#[command(name = "hotkey-trainer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture keys system-wide; the toggle combination switches capture on and off
    Capture,

    /// Print captured tokens as they arrive
    Watch,

    /// Practice shortcuts against the captured token stream
    Practice {
        /// Shortcuts to practice, chord steps separated by spaces ("cmd+k cmd+s")
        #[arg(required = true)]
        shortcuts: Vec<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CaptureError>() {
                Some(capture) if capture.is_subscription_failure() => {
                    eprintln!("{} {}", "Cannot capture keys:".red().bold(), capture);
                    if let Some(remedy) = capture.remedy() {
                        eprintln!("\n{}", remedy);
                    }
                }
                _ => eprintln!("{} {:#}", "Error:".red().bold(), err),
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 when keys cannot be captured at all, 1 for any other failure
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CaptureError>() {
        Some(capture) if capture.is_subscription_failure() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Capture => capture(&config),
        Commands::Watch => watch(&config),
        Commands::Practice { shortcuts } => practice(&config, &shortcuts),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

#[cfg(target_os = "linux")]
fn open_hook() -> Result<(Box<dyn CaptureHook>, Box<dyn KeyLookup>), CaptureError> {
    Ok((Box::new(EvdevHook::new()?), Box::new(EvdevKeyLookup)))
}

#[cfg(not(target_os = "linux"))]
fn open_hook() -> Result<(Box<dyn CaptureHook>, Box<dyn KeyLookup>), CaptureError> {
    Err(CaptureError::Unsupported)
}

/// Run the capture loop until interrupted
fn capture(config: &Config) -> Result<()> {
    let toggle = ToggleCombo::parse(&config.capture.toggle)?;
    let shutdown = ShutdownSignal::install().context("Failed to install signal handler")?;
    let (mut hook, lookup) = open_hook()?;

    let controller = Arc::new(CaptureController::new(
        config.capture.output_path(),
        config.capture.close_timeout(),
    ));
    let mut engine = CaptureEngine::new(controller, toggle, lookup)
        .with_translator(Translator::new(config.capture.quirks()));

    println!("{} Capture ready", "✓".green());
    println!("  Toggle:  {}", engine.toggle_combo().to_string().cyan());
    println!("  Output:  {}", config.capture.output_path().display());
    println!("  Press Ctrl+C (while capture is off) to quit");

    let summary = run_capture(
        hook.as_mut(),
        &mut engine,
        &shutdown,
        config.capture.poll_interval(),
    )?;

    log::info!(
        "capture stopped: {} events, {} tokens, {} toggles, {} re-enables",
        summary.stats.events,
        summary.stats.tokens,
        summary.stats.toggles,
        summary.reenabled
    );
    Ok(())
}

/// Print tokens from the output channel as they arrive
fn watch(config: &Config) -> Result<()> {
    let shutdown = ShutdownSignal::install().context("Failed to install signal handler")?;
    let mut tail = TokenTail::new(config.capture.output_path());
    tail.skip_existing();

    println!("Watching {} (Ctrl+C to stop)", tail.path().display());
    while !shutdown.is_cancelled() {
        for token in tail.read_new() {
            println!("{}", token.as_str().cyan());
        }
        thread::sleep(config.practice.poll_interval());
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    skipped: usize,
    mistakes: usize,
    times: Vec<Duration>,
}

enum Step {
    Continue,
    Retry,
    Next,
    Stop,
}

fn parse_shortcuts(shortcuts: &[String]) -> Result<Vec<ShortcutDefinition>, DefinitionError> {
    shortcuts
        .iter()
        .map(|keys| -> Result<ShortcutDefinition, DefinitionError> {
            let def = ShortcutDefinition::parse(keys.trim(), keys)?;
            def.validate()?;
            Ok(def)
        })
        .collect()
}

/// Drive the chord matcher from the output channel
fn practice(config: &Config, shortcuts: &[String]) -> Result<()> {
    let definitions = parse_shortcuts(shortcuts).context("Invalid shortcut")?;
    let shutdown = ShutdownSignal::install().context("Failed to install signal handler")?;

    let mut tail = TokenTail::new(config.capture.output_path());
    let mut matcher = ChordMatcher::new(config.practice.matcher_settings());
    let mut pending: VecDeque<CanonicalToken> = VecDeque::new();
    let mut tally = Tally::default();

    if !tail.channel_exists() {
        println!(
            "{}",
            format!(
                "Capture is off. Run `hotkey-trainer capture` and press {} to start.",
                config.capture.toggle
            )
            .yellow()
        );
    }
    println!("{}", "Press ` (backtick) to skip, `` (twice) to quit".yellow());
    tail.skip_existing();

    let total = definitions.len();
    'shortcuts: for (idx, def) in definitions.iter().enumerate() {
        println!();
        println!("{}", format!("[{}/{}]", idx + 1, total).bold());
        println!("  {}  {}", "Type:".cyan(), def.display_symbols().magenta().bold());
        if def.is_chord() {
            println!("  {}", "Chord: press the first combo, release, then the next".yellow());
        }
        matcher.begin(def, Instant::now())?;

        loop {
            if shutdown.is_cancelled() {
                break 'shortcuts;
            }
            if let Some(event) = matcher.check_timeout(Instant::now()) {
                match report(event, &mut tally) {
                    Step::Stop => break 'shortcuts,
                    Step::Retry => matcher.begin(def, Instant::now())?,
                    Step::Next => continue 'shortcuts,
                    Step::Continue => {}
                }
            }

            pending.extend(tail.read_new());
            while let Some(token) = pending.pop_front() {
                let event = matcher.feed(&token, Instant::now());
                match report(event, &mut tally) {
                    Step::Continue => {}
                    Step::Retry => matcher.begin(def, Instant::now())?,
                    Step::Next => continue 'shortcuts,
                    Step::Stop => break 'shortcuts,
                }
            }
            thread::sleep(config.practice.poll_interval());
        }
    }

    print_tally(&tally);
    Ok(())
}

fn report(event: MatchEvent, tally: &mut Tally) -> Step {
    match event {
        MatchEvent::Ignored => Step::Continue,
        MatchEvent::Progress {
            completed,
            total,
            hesitated,
        } => {
            let mut line = format!("  {} step {}/{}", "✓".green(), completed, total);
            if hesitated {
                line.push_str(&" (hesitated)".yellow().to_string());
            }
            println!("{}", line);
            Step::Continue
        }
        MatchEvent::Success(summary) => {
            println!(
                "  {} {:.2}s",
                "✅ Correct!".green().bold(),
                summary.elapsed.as_secs_f64()
            );
            if summary.hesitations > 0 {
                println!("  {}", "Try to chain the steps without pausing".yellow());
            }
            tally.completed += 1;
            tally.times.push(summary.elapsed);
            Step::Next
        }
        MatchEvent::Failure { expected, received } => {
            println!(
                "  {} typed {}, expected {}",
                "❌".red(),
                received.as_str().red(),
                expected.as_str().green()
            );
            if let Some(text) = hint(&expected, &received) {
                println!("  💡 {}", text);
            }
            tally.mistakes += 1;
            Step::Retry
        }
        MatchEvent::Skip => {
            println!("  {}", "Skipped".yellow());
            tally.skipped += 1;
            Step::Next
        }
        MatchEvent::TimedOut => {
            println!("  {}", "Out of time".yellow());
            tally.skipped += 1;
            Step::Next
        }
        MatchEvent::Abort => {
            println!("\n{}", "Exiting practice...".yellow());
            Step::Stop
        }
    }
}

fn print_tally(tally: &Tally) {
    println!();
    println!("{}", "Results".bold());
    println!("  Completed: {}", tally.completed.to_string().green());
    println!("  Skipped:   {}", tally.skipped.to_string().yellow());
    println!("  Mistakes:  {}", tally.mistakes.to_string().red());
    if !tally.times.is_empty() {
        let total: Duration = tally.times.iter().sum();
        let avg = total.as_secs_f64() / tally.times.len() as f64;
        println!("  Average:   {:.2}s", avg);
    }
}
