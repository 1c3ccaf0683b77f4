//! Audio alert sinks backed by external commands.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{Alert, AlertSink};
use crate::config::AlertSettings;

/// Players tried in order when none is configured.
const PLAYER_CANDIDATES: [(&str, &[&str]); 4] = [
    ("afplay", &[]),
    ("paplay", &[]),
    ("aplay", &["-q"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
];

/// Plays a local sound file.
///
/// A missing file is not an error: the alert still shows on screen, it is just
/// silent.
pub struct SoundSink {
    path: PathBuf,
    player: Option<String>,
}

impl SoundSink {
    pub fn new(path: PathBuf, player: Option<String>) -> Self {
        Self { path, player }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn player_command(&self) -> Option<(String, Vec<String>)> {
        if let Some(line) = self.player.as_deref() {
            return split_command(line);
        }
        PLAYER_CANDIDATES
            .iter()
            .find(|(program, _)| find_on_path(program).is_some())
            .map(|(program, args)| {
                (
                    program.to_string(),
                    args.iter().map(|a| a.to_string()).collect(),
                )
            })
    }
}

impl AlertSink for SoundSink {
    fn name(&self) -> &str {
        "sound"
    }

    fn fire(&mut self, _alert: &Alert) -> Result<()> {
        if !self.path.is_file() {
            log::debug!("sound: {} not found; alert is silent", self.path.display());
            return Ok(());
        }
        let (program, mut args) = self
            .player_command()
            .ok_or_else(|| anyhow!("no audio player found on PATH"))?;
        args.push(self.path.display().to_string());
        spawn_detached(&program, &args)
    }
}

/// Speaks a fixed message through a text-to-speech command (`espeak`, `say`).
pub struct VoiceSink {
    command: String,
    message: String,
}

impl VoiceSink {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }

    /// `None` when no voice command is configured.
    pub fn from_settings(settings: &AlertSettings) -> Option<Self> {
        settings
            .voice_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| Self::new(c, settings.voice_message.clone()))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Speak arbitrary text without waiting for it to finish.
    pub fn speak(&self, text: &str) -> Result<()> {
        let (program, mut args) = split_command(&self.command)
            .ok_or_else(|| anyhow!("voice command is empty"))?;
        args.push(text.to_string());
        spawn_detached(&program, &args)
    }
}

impl AlertSink for VoiceSink {
    fn name(&self) -> &str {
        "voice"
    }

    fn fire(&mut self, _alert: &Alert) -> Result<()> {
        self.speak(&self.message)
    }
}

fn split_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Start `program` in the background. The child is reaped on a helper thread.
fn spawn_detached(program: &str, args: &[String]) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start {}", program))?;
    std::thread::spawn(move || {
        if let Err(err) = child.wait() {
            log::debug!("alert command did not exit cleanly: {}", err);
        }
    });
    Ok(())
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
