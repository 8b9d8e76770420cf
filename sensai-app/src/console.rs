//! Stdin-backed adapters: the line reader and the transcript recognizer.

use std::io::BufRead;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sensai_core::{CommandRecognizer, TranscriptSink};

use crate::commands::{parse_console_line, ConsoleInput};

/// A recognition session ends after this long without a transcript, like a
/// browser session timing out on silence.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Feeds typed transcripts to the coordinator through the supervised
/// recognizer path.
pub struct StdinRecognizer {
    transcripts: Receiver<String>,
    idle_timeout: Duration,
}

impl StdinRecognizer {
    pub fn new(transcripts: Receiver<String>, idle_timeout: Duration) -> Self {
        Self {
            transcripts,
            idle_timeout,
        }
    }
}

impl CommandRecognizer for StdinRecognizer {
    fn listen(&mut self, sink: &TranscriptSink) -> sensai_core::error::Result<()> {
        const POLL: Duration = Duration::from_millis(250);
        let mut idle = Duration::ZERO;
        while sink.is_open() {
            match self.transcripts.recv_timeout(POLL.min(self.idle_timeout)) {
                Ok(transcript) => {
                    idle = Duration::ZERO;
                    if !sink.push(transcript) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    idle += POLL.min(self.idle_timeout);
                    if idle >= self.idle_timeout {
                        debug!("recognizer session idle — ending stream");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow::anyhow!("stdin closed").into());
                }
            }
        }
        Ok(())
    }
}

/// Read stdin on a dedicated thread. Transcripts go to the recognizer,
/// everything else to the console loop. EOF is reported as `Quit`.
pub fn spawn_stdin_reader(
    transcripts: Sender<String>,
    commands: mpsc::Sender<ConsoleInput>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("sensai-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                };
                let Some(input) = parse_console_line(&line) else {
                    continue;
                };
                let delivered = match input {
                    ConsoleInput::Transcript(text) => transcripts.send(text).is_ok(),
                    other => commands.blocking_send(other).is_ok(),
                };
                if !delivered {
                    break;
                }
            }
            info!("stdin closed");
            let _ = commands.blocking_send(ConsoleInput::Quit);
        })?;
    Ok(())
}
