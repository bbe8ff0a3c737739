//! firstwords main entry point
//!
//! Brings the speech layer up the way the app does at launch: load settings
//! and the stored audio preferences, run the startup initializer, then speak
//! the words given on the command line (or list voices).

use anyhow::{bail, Context};
use firstwords::speech::{initialize_speech, SpeechOutcome, SpeechService};
use firstwords::state::{AudioConfigStore, FileStore, Settings};
use log::{debug, error, info, warn};
use std::process;

const USAGE: &str = "Usage: firstwords [--debug|-d] [--voices] [--rate R] [--pitch P] [--voice ID] [text...]";

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    debug: bool,
    list_voices: bool,
    rate: Option<f32>,
    pitch: Option<f32>,
    voice: Option<String>,
    text: Vec<String>,
}

impl Args {
    fn parse(raw: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut args = Args::default();
        let mut iter = raw.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" | "-d" => args.debug = true,
                "--voices" => args.list_voices = true,
                "--rate" => {
                    let value = iter.next().context("--rate needs a value")?;
                    args.rate = Some(value.parse().with_context(|| format!("invalid rate: {}", value))?);
                }
                "--pitch" => {
                    let value = iter.next().context("--pitch needs a value")?;
                    args.pitch = Some(value.parse().with_context(|| format!("invalid pitch: {}", value))?);
                }
                "--voice" => {
                    args.voice = Some(iter.next().context("--voice needs a value")?);
                }
                "--help" | "-h" => {
                    println!("{}", USAGE);
                    process::exit(0);
                }
                other if other.starts_with("--") => bail!("unknown option {}\n{}", other, USAGE),
                _ => args.text.push(arg),
            }
        }

        Ok(args)
    }
}

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    };

    // Initialize logger
    if args.debug {
        // Debug mode: write to firstwords.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("firstwords.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open firstwords.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "firstwords version {} starting (debug mode, logging to firstwords.log)",
            firstwords::VERSION
        );
    } else {
        // Normal mode: errors only, unless RUST_LOG says otherwise
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }

    if let Err(e) = run(args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    info!("Settings loaded from {:?}", settings.path());

    let mut audio = AudioConfigStore::open(Box::new(FileStore::new(settings.storage_path())));
    if let Some(rate) = args.rate {
        audio.set_rate(rate).context("saving rate")?;
    }
    if let Some(pitch) = args.pitch {
        audio.set_pitch(pitch).context("saving pitch")?;
    }
    if let Some(voice) = &args.voice {
        audio.set_voice(voice.as_str()).context("saving voice")?;
    }
    debug!("Audio preferences: {:?}", audio.config());

    let mut service = SpeechService::from_settings(&settings);
    let report = initialize_speech(&mut service, &settings, audio.config());
    if !report.initialized() {
        warn!("Running without speech");
    }

    if args.list_voices {
        for voice in service.list_voices() {
            println!("{}\t{}\t{}", voice.id, voice.language, voice.name);
        }
    }

    if !args.text.is_empty() {
        let text = args.text.join(" ");
        let request = audio.config().request(text, &settings.language());
        match service.speak(&request) {
            Ok(SpeechOutcome::Errored(reason)) => bail!("playback failed: {}", reason),
            Ok(outcome) => debug!("Utterance ended: {:?}", outcome),
            Err(e) if e.is_unavailable() => {
                // Degraded mode: silence, not a crash
                warn!("No audio: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    service.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_flags_and_text() {
        let args = parse(&["-d", "--rate", "0.7", "--voice", "pt-BR", "bola", "azul"]).unwrap();
        assert!(args.debug);
        assert_eq!(args.rate, Some(0.7));
        assert_eq!(args.voice.as_deref(), Some("pt-BR"));
        assert_eq!(args.text, vec!["bola", "azul"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--rate"]).is_err());
        assert!(parse(&["--pitch", "high"]).is_err());
        assert!(parse(&["--loud"]).is_err());
    }
}
