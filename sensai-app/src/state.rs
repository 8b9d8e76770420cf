//! Host application state shared by the console loop and event forwarders.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;

use sensai_core::{Coordinator, DiagnosticsSnapshot, GuidanceRuntime};

use crate::settings::AppSettings;

pub struct AppState {
    /// Vision loop and recognizer supervisor.
    pub runtime: Arc<GuidanceRuntime>,
    /// Persisted app settings cache.
    pub settings: Arc<Mutex<AppSettings>>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
    /// Console commands executed.
    pub console_commands: AtomicUsize,
    /// Console lines that did not parse as a command.
    pub console_rejected: AtomicUsize,
    /// Events the printers dropped because a receiver lagged.
    pub events_lagged: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(runtime: Arc<GuidanceRuntime>, settings: AppSettings, settings_path: PathBuf) -> Self {
        Self {
            runtime,
            settings: Arc::new(Mutex::new(settings)),
            settings_path,
            console_commands: AtomicUsize::new(0),
            console_rejected: AtomicUsize::new(0),
            events_lagged: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        self.runtime.coordinator()
    }

    pub fn diagnostics_snapshot(&self) -> AppDiagnostics {
        AppDiagnostics {
            console_commands: self.console_commands.load(Ordering::Relaxed),
            console_rejected: self.console_rejected.load(Ordering::Relaxed),
            events_lagged: self.events_lagged.load(Ordering::Relaxed),
            runtime_running: self.runtime.is_running(),
            speech_enabled: self.coordinator().speech_enabled(),
            coordinator: self.coordinator().diagnostics_snapshot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDiagnostics {
    pub console_commands: usize,
    pub console_rejected: usize,
    pub events_lagged: usize,
    pub runtime_running: bool,
    pub speech_enabled: bool,
    pub coordinator: DiagnosticsSnapshot,
}
