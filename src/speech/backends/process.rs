//! Process backend using espeak-ng
//!
//! Spawns one `espeak-ng` process per utterance and watches it for
//! completion. Nothing is linked natively, which makes this the backend for
//! the managed preview runtime and for WSL, where PulseAudio is reachable
//! through /mnt/wslg/PulseServer.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::platform::is_wsl;
use crate::speech::backend::{BackendKind, Playback, SpeechBackend, Voice, DEFAULT_POLL_INTERVAL};
use crate::speech::request::SpeechRequest;
use crate::{FirstWordsError, Result};
use log::{debug, error, info, warn};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Words per minute at rate 1.0
const BASE_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

/// espeak pitch at multiplier 1.0 (scale is 0-99)
const BASE_PITCH: f32 = 50.0;

/// espeak-ng backend
pub struct ProcessBackend {
    /// Resolved espeak-ng executable, set by `initialize`
    espeak_path: Option<String>,

    /// Arguments placed before the espeak options
    leading_args: Vec<String>,

    /// Process speaking the current utterance
    current_process: Option<Child>,

    poll_interval: Duration,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            espeak_path: None,
            leading_args: Vec::new(),
            current_process: None,
            poll_interval,
        }
    }

    /// Backend that runs `program` with `leading_args` instead of searching
    /// for espeak-ng; counts as initialized
    #[cfg(test)]
    pub(crate) fn with_command(program: &str, leading_args: &[&str], poll_interval: Duration) -> Self {
        Self {
            espeak_path: Some(program.to_string()),
            leading_args: leading_args.iter().map(|a| a.to_string()).collect(),
            current_process: None,
            poll_interval,
        }
    }

    fn command(&self) -> Result<Command> {
        let mut cmd = Command::new(self.espeak()?);
        cmd.args(&self.leading_args);
        Ok(cmd)
    }

    /// Setup PulseAudio server environment
    ///
    /// Auto-detects the WSLG PulseAudio server and sets PULSE_SERVER if needed.
    fn setup_pulseaudio() -> Result<()> {
        const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

        if std::env::var("PULSE_SERVER").is_ok() {
            debug!("PULSE_SERVER already set via environment");
            return Ok(());
        }

        if std::path::Path::new(WSLG_PULSE_PATH).exists() {
            info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
            std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
            return Ok(());
        }

        if is_wsl() {
            warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
            warn!("Make sure WSLg is installed and running, or set PULSE_SERVER");
            return Err(FirstWordsError::Unavailable(
                "PulseAudio server not found. Install WSLg or set PULSE_SERVER environment variable."
                    .to_string(),
            ));
        }

        // Elsewhere espeak-ng uses the default audio configuration
        Ok(())
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = ["espeak-ng", "/usr/bin/espeak-ng", "/usr/local/bin/espeak-ng"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(FirstWordsError::Unavailable(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    fn espeak(&self) -> Result<&str> {
        self.espeak_path
            .as_deref()
            .ok_or_else(|| FirstWordsError::Unavailable("espeak-ng backend not initialized".to_string()))
    }

    /// Convert a rate multiplier to espeak speed (80-450 wpm)
    pub fn rate_to_wpm(rate: f32) -> u16 {
        (BASE_WPM * rate).clamp(MIN_WPM, MAX_WPM).round() as u16
    }

    /// Convert a pitch multiplier to espeak pitch (0-99)
    pub fn pitch_to_espeak(pitch: f32) -> u8 {
        (BASE_PITCH * pitch).clamp(0.0, 99.0).round() as u8
    }

    /// Voice argument for `-v`: explicit voice id, else the language tag
    pub fn voice_arg(request: &SpeechRequest) -> String {
        match &request.voice {
            Some(voice) => voice.clone(),
            None => request.language.to_ascii_lowercase(),
        }
    }

    /// Parse the table printed by `espeak-ng --voices`
    ///
    /// ```text
    /// Pty Language       Age/Gender VoiceName          File                 Other Languages
    ///  5  pt-BR           --/M      Portuguese_(Brazil) roa/pt-BR            (pt 6)
    /// ```
    pub fn parse_voices(listing: &str) -> Vec<Voice> {
        listing
            .lines()
            .skip_while(|line| !line.trim_start().starts_with("Pty"))
            .skip(1)
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                if cols.len() < 5 {
                    return None;
                }
                Some(Voice {
                    id: cols[1].to_string(),
                    name: cols[3].replace('_', " "),
                    language: cols[1].to_string(),
                })
            })
            .collect()
    }

    /// Kill the process speaking the current utterance, if any
    fn cancel_process(&mut self) {
        if let Some(mut child) = self.current_process.take() {
            debug!("Killing espeak-ng process");
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait(); // Clean up zombie
                }
                Err(e) => {
                    debug!("Failed to kill espeak-ng process: {}", e);
                }
            }
        }
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechBackend for ProcessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Process
    }

    fn is_initialized(&self) -> bool {
        self.espeak_path.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            debug!("espeak-ng backend already initialized");
            return Ok(());
        }

        Self::setup_pulseaudio()?;
        let path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", path);
        self.espeak_path = Some(path);
        Ok(())
    }

    fn start(&mut self, request: &SpeechRequest) -> Result<()> {
        self.cancel_process();

        let mut cmd = self.command()?;
        cmd.arg("-v").arg(Self::voice_arg(request));
        cmd.arg("-s").arg(Self::rate_to_wpm(request.rate).to_string());
        cmd.arg("-p").arg(Self::pitch_to_espeak(request.pitch).to_string());
        // Keep text that starts with '-' from being read as an option
        cmd.arg("--").arg(&request.text);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        match cmd.spawn() {
            Ok(child) => {
                debug!("espeak-ng process started for {:?}", request.text);
                self.current_process = Some(child);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn espeak-ng: {}", e);
                Err(FirstWordsError::Playback(format!("Failed to start espeak-ng: {}", e)))
            }
        }
    }

    fn poll(&mut self) -> Result<Playback> {
        let Some(child) = self.current_process.as_mut() else {
            return Ok(Playback::Idle);
        };

        match child.try_wait() {
            Ok(None) => Ok(Playback::Playing),
            Ok(Some(status)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                self.current_process = None;

                if status.success() {
                    Ok(Playback::Idle)
                } else {
                    Err(FirstWordsError::Playback(format!(
                        "espeak-ng exited with {}: {}",
                        status,
                        stderr.trim()
                    )))
                }
            }
            Err(e) => {
                self.current_process = None;
                Err(FirstWordsError::Playback(format!("Failed to check espeak-ng: {}", e)))
            }
        }
    }

    fn halt(&mut self) -> Result<()> {
        self.cancel_process();
        Ok(())
    }

    fn voices(&mut self) -> Result<Vec<Voice>> {
        let output = self
            .command()?
            .arg("--voices")
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(FirstWordsError::Playback(format!(
                "espeak-ng --voices exited with {}",
                output.status
            )));
        }

        Ok(Self::parse_voices(&String::from_utf8_lossy(&output.stdout)))
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Drop for ProcessBackend {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.cancel_process();
    }
}
