//! Console command handlers.
//!
//! Stdin lines starting with `/` stand in for the on-screen controls; every
//! other line is a recognizer transcript. Handlers return the text to print
//! or an error string, like UI command handlers would.

use std::sync::atomic::Ordering;

use tracing::info;

use sensai_core::{ManualToggle, UiSnapshot};

use crate::settings::{normalize_wake_phrase, save_settings};
use crate::state::{AppDiagnostics, AppState};

pub const HELP: &str = "\
commands:
  <text>             spoken transcript, e.g. \"ok sensei switch to capture\"
  /alerts on|off     guide mode / capture mode
  /flip              flip the camera
  /capture           read text in front of the camera
  /status            print the UI snapshot
  /diag              print diagnostics
  /wake <phrase>     persist a new wake phrase (applies on next start)
  /help              this text
  /quit              exit";

/// One parsed stdin line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Transcript(String),
    Toggle(ManualToggle),
    Capture,
    Status,
    Diagnostics,
    SetWakePhrase(String),
    Help,
    Quit,
    Unknown(String),
}

/// `None` for blank lines.
pub fn parse_console_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleInput::Transcript(line.to_string()));
    };

    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let input = match (name.as_str(), arg.to_ascii_lowercase().as_str()) {
        ("alerts", "on") => ConsoleInput::Toggle(ManualToggle::AlertsOn),
        ("alerts", "off") => ConsoleInput::Toggle(ManualToggle::AlertsOff),
        ("flip", _) => ConsoleInput::Toggle(ManualToggle::FlipCamera),
        ("capture", _) => ConsoleInput::Capture,
        ("status", _) => ConsoleInput::Status,
        ("diag", _) => ConsoleInput::Diagnostics,
        ("wake", phrase) if !phrase.is_empty() => ConsoleInput::SetWakePhrase(arg.to_string()),
        ("help", _) => ConsoleInput::Help,
        ("quit" | "exit", _) => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(line.to_string()),
    };
    Some(input)
}

/// Manual toggle, no wake phrase required.
pub async fn toggle(state: &AppState, toggle: ManualToggle) -> Result<String, String> {
    state.coordinator().on_manual_toggle(toggle).await;
    Ok(format!("mode: {:?}", state.coordinator().mode()))
}

/// Capture a frame and read its text.
pub async fn capture_text(state: &AppState) -> Result<String, String> {
    state
        .coordinator()
        .capture_and_extract()
        .await
        .map_err(|e| e.user_message())
}

pub fn get_snapshot(state: &AppState) -> Result<UiSnapshot, String> {
    Ok(state.coordinator().snapshot())
}

pub fn get_diagnostics(state: &AppState) -> Result<AppDiagnostics, String> {
    Ok(state.diagnostics_snapshot())
}

/// Persist a new wake phrase.
///
/// The running coordinator keeps its phrase; the new one applies on next start.
pub fn set_wake_phrase(state: &AppState, phrase: &str) -> Result<String, String> {
    let mut settings = state.settings.lock();
    settings.wake_phrase = normalize_wake_phrase(phrase);
    save_settings(&state.settings_path, &settings).map_err(|e| e.to_string())?;
    info!(wake_phrase = %settings.wake_phrase, "wake phrase saved");
    Ok(format!(
        "wake phrase saved as \"{}\" (applies on next start)",
        settings.wake_phrase
    ))
}

/// Run one non-transcript console command.
pub async fn dispatch(state: &AppState, input: ConsoleInput) -> Result<String, String> {
    let result = match input {
        ConsoleInput::Toggle(t) => toggle(state, t).await,
        ConsoleInput::Capture => capture_text(state).await,
        ConsoleInput::Status => get_snapshot(state).and_then(|s| to_json(&s)),
        ConsoleInput::Diagnostics => get_diagnostics(state).and_then(|d| to_json(&d)),
        ConsoleInput::SetWakePhrase(phrase) => set_wake_phrase(state, &phrase),
        ConsoleInput::Help => Ok(HELP.to_string()),
        ConsoleInput::Unknown(line) => {
            state.console_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(format!("unknown command: {line} (try /help)"));
        }
        ConsoleInput::Transcript(_) | ConsoleInput::Quit => {
            return Err("not a console command".into());
        }
    };
    state.console_commands.fetch_add(1, Ordering::Relaxed);
    result
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
