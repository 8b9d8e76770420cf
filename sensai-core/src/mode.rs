//! Operating mode and voice-command parsing.
//!
//! ## Commands
//!
//! | transcript contains (after wake phrase) | command |
//! |---|---|
//! | `"switch to capture"` | `SwitchToCapture` |
//! | `"switch to guide"` | `SwitchToGuide` |
//! | `"flip the camera"` | `FlipCamera` |
//! | anything else | `Unrecognized` |
//!
//! Transcripts without the wake phrase parse to `None` and are dropped
//! silently by the coordinator.

use serde::{Deserialize, Serialize};

/// Default wake phrase that must precede every voice command.
pub const DEFAULT_WAKE_PHRASE: &str = "ok sensei";

/// Current operating mode. `Guide` on startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Continuous obstacle and direction guidance.
    #[default]
    Guide,
    /// One-shot text reading; guidance is silenced.
    Capture,
}

/// A voice command after wake-phrase and phrase matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SwitchToCapture,
    SwitchToGuide,
    FlipCamera,
    Unrecognized,
}

impl Command {
    /// Confirmation spoken after the command is applied.
    pub fn confirmation(self) -> Option<&'static str> {
        match self {
            Self::SwitchToCapture => Some("Capture mode activated."),
            Self::SwitchToGuide => Some("Guide mode activated."),
            Self::FlipCamera => Some("Camera flipped."),
            Self::Unrecognized => None,
        }
    }

    /// Mode the confirmation requires to be audible. `None` means it is
    /// always spoken.
    pub fn confirmation_requires(self) -> Option<Mode> {
        match self {
            Self::SwitchToGuide => Some(Mode::Guide),
            _ => None,
        }
    }
}

/// UI-triggered equivalents of the voice commands.
///
/// Alerts on/off is the on-screen guidance switch: turning alerts off is the
/// same as "switch to capture", turning them on is "switch to guide".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManualToggle {
    FlipCamera,
    AlertsOn,
    AlertsOff,
}

impl ManualToggle {
    pub fn command(self) -> Command {
        match self {
            Self::FlipCamera => Command::FlipCamera,
            Self::AlertsOn => Command::SwitchToGuide,
            Self::AlertsOff => Command::SwitchToCapture,
        }
    }
}

/// Wake-phrase gated command parser.
#[derive(Debug, Clone)]
pub struct CommandParser {
    wake_phrase: String,
}

impl CommandParser {
    pub fn new(wake_phrase: &str) -> Self {
        Self {
            wake_phrase: normalize(wake_phrase),
        }
    }

    pub fn wake_phrase(&self) -> &str {
        &self.wake_phrase
    }

    /// Parse a transcript. Returns `None` when the wake phrase is absent.
    ///
    /// Matching is case-insensitive and whitespace-tolerant. The wake phrase
    /// must appear as whole words; only the words after its first occurrence
    /// are searched for an action phrase.
    pub fn parse(&self, transcript: &str) -> Option<Command> {
        let wake: Vec<&str> = self.wake_phrase.split(' ').filter(|w| !w.is_empty()).collect();
        if wake.is_empty() {
            return None;
        }
        let text = normalize(transcript);
        let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        let start = words
            .windows(wake.len())
            .position(|window| window == wake.as_slice())?;
        let action = words[start + wake.len()..].join(" ");

        let command = if action.contains("switch to capture") {
            Command::SwitchToCapture
        } else if action.contains("switch to guide") {
            Command::SwitchToGuide
        } else if action.contains("flip the camera") {
            Command::FlipCamera
        } else {
            Command::Unrecognized
        };
        Some(command)
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(DEFAULT_WAKE_PHRASE)
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of applying a command to the mode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Two-state mode machine. Never times out; only commands move it.
#[derive(Debug, Clone, Default)]
pub struct ModeMachine {
    mode: Mode,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Apply a command. Repeating a switch to the current mode is a no-op
    /// transition.
    pub fn apply(&mut self, command: Command) -> Transition {
        let from = self.mode;
        self.mode = match command {
            Command::SwitchToCapture => Mode::Capture,
            Command::SwitchToGuide => Mode::Guide,
            Command::FlipCamera | Command::Unrecognized => from,
        };
        Transition {
            from,
            to: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_guide() {
        assert_eq!(ModeMachine::new().mode(), Mode::Guide);
    }

    #[test]
    fn parses_commands_after_wake_phrase() {
        let parser = CommandParser::default();
        assert_eq!(
            parser.parse("ok sensei switch to capture"),
            Some(Command::SwitchToCapture)
        );
        assert_eq!(
            parser.parse("OK Sensei, switch to guide."),
            Some(Command::SwitchToGuide)
        );
        assert_eq!(
            parser.parse("um ok sensei please flip the camera"),
            Some(Command::FlipCamera)
        );
    }

    #[test]
    fn missing_wake_phrase_is_ignored() {
        let parser = CommandParser::default();
        assert_eq!(parser.parse("switch to capture"), None);
        assert_eq!(parser.parse(""), None);
    }

    #[test]
    fn wake_phrase_inside_other_words_does_not_count() {
        let parser = CommandParser::default();
        assert_eq!(parser.parse("look sensei switch to capture"), None);
        assert_eq!(parser.parse("took sensei switch to capture"), None);
        assert_eq!(parser.parse("ok senseis switch to capture"), None);
        assert_eq!(
            parser.parse("look, ok sensei switch to capture"),
            Some(Command::SwitchToCapture)
        );
    }

    #[test]
    fn action_before_wake_phrase_does_not_count() {
        let parser = CommandParser::default();
        assert_eq!(
            parser.parse("switch to capture ok sensei"),
            Some(Command::Unrecognized)
        );
    }

    #[test]
    fn wake_phrase_with_unknown_action_is_unrecognized() {
        let parser = CommandParser::default();
        assert_eq!(
            parser.parse("ok sensei what time is it"),
            Some(Command::Unrecognized)
        );
    }

    #[test]
    fn custom_wake_phrase() {
        let parser = CommandParser::new("Hey Guide");
        assert_eq!(parser.wake_phrase(), "hey guide");
        assert_eq!(
            parser.parse("hey guide switch to capture"),
            Some(Command::SwitchToCapture)
        );
        assert_eq!(parser.parse("ok sensei switch to capture"), None);
    }

    #[test]
    fn blank_wake_phrase_never_matches() {
        let parser = CommandParser::new("  ");
        assert_eq!(parser.parse("switch to capture"), None);
    }

    #[test]
    fn transitions_are_idempotent() {
        let mut machine = ModeMachine::new();
        let t = machine.apply(Command::SwitchToGuide);
        assert!(!t.changed());
        assert_eq!(machine.mode(), Mode::Guide);

        let t = machine.apply(Command::SwitchToCapture);
        assert!(t.changed());
        assert_eq!((t.from, t.to), (Mode::Guide, Mode::Capture));

        let t = machine.apply(Command::SwitchToCapture);
        assert!(!t.changed());

        let t = machine.apply(Command::FlipCamera);
        assert_eq!(t.to, Mode::Capture);
        let t = machine.apply(Command::Unrecognized);
        assert_eq!(t.to, Mode::Capture);
    }

    #[test]
    fn manual_toggles_map_to_commands() {
        assert_eq!(ManualToggle::AlertsOff.command(), Command::SwitchToCapture);
        assert_eq!(ManualToggle::AlertsOn.command(), Command::SwitchToGuide);
        assert_eq!(ManualToggle::FlipCamera.command(), Command::FlipCamera);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Capture).expect("ser"), "\"capture\"");
        assert!(serde_json::from_str::<Mode>("\"Guide\"").is_err());
    }
}
