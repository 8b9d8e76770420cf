//! `ConsoleActuator` — speech stand-in that "speaks" to stdout.
//!
//! Words are emitted at a fixed pace on a worker thread so that an utterance
//! takes real time and can be interrupted, mirroring a browser
//! `speechSynthesis` queue that is cancelled before every `speak`.

use std::io::Write;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::{Result, SensaiError};
use crate::speech::SpeechActuator;

enum SpeechCommand {
    Speak { text: String, lang: String },
    Cancel,
    Shutdown,
}

pub struct ConsoleActuator {
    tx: Sender<SpeechCommand>,
    worker: Option<JoinHandle<()>>,
}

impl ConsoleActuator {
    /// Spawn the worker thread. `word_interval` is the simulated time per word.
    pub fn spawn(word_interval: Duration) -> Result<Self> {
        let (tx, rx) = unbounded();
        let worker = std::thread::Builder::new()
            .name("sensai-speech".into())
            .spawn(move || run_worker(rx, word_interval))?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }
}

impl SpeechActuator for ConsoleActuator {
    fn speak(&mut self, text: &str, lang: &str) -> Result<()> {
        self.tx
            .send(SpeechCommand::Speak {
                text: text.to_string(),
                lang: lang.to_string(),
            })
            .map_err(|_| SensaiError::Other(anyhow::anyhow!("speech worker has exited")))
    }

    fn cancel(&mut self) {
        let _ = self.tx.send(SpeechCommand::Cancel);
    }
}

impl Drop for ConsoleActuator {
    fn drop(&mut self) {
        let _ = self.tx.send(SpeechCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("speech worker panicked");
            }
        }
    }
}

fn run_worker(rx: Receiver<SpeechCommand>, word_interval: Duration) {
    let mut pending: Option<SpeechCommand> = None;
    loop {
        let command = match pending.take() {
            Some(c) => c,
            None => match rx.recv() {
                Ok(c) => c,
                Err(_) => return,
            },
        };

        let (text, lang) = match command {
            SpeechCommand::Speak { text, lang } => (text, lang),
            SpeechCommand::Cancel => continue,
            SpeechCommand::Shutdown => return,
        };

        let mut spoken: Vec<&str> = Vec::new();
        let mut interrupted = false;
        for word in text.split_whitespace() {
            spoken.push(word);
            match rx.recv_timeout(word_interval) {
                Ok(next) => {
                    interrupted = true;
                    if !matches!(next, SpeechCommand::Cancel) {
                        pending = Some(next);
                    }
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        let line = if interrupted {
            format!("[speech {lang}] {} …(cancelled)", spoken.join(" "))
        } else {
            format!("[speech {lang}] {text}")
        };
        debug!(interrupted, "utterance finished");
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}
