//! Relaxed atomic counters for coordinator observability.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct CoordinatorDiagnostics {
    pub batches_in: AtomicUsize,
    pub cycles_accepted: AtomicUsize,
    pub cycles_skipped: AtomicUsize,
    pub signals_derived: AtomicUsize,
    pub utterances_forwarded: AtomicUsize,
    pub utterances_debounced: AtomicUsize,
    pub utterances_mode_gated: AtomicUsize,
    pub commands_parsed: AtomicUsize,
    pub commands_ignored: AtomicUsize,
    pub commands_unrecognized: AtomicUsize,
    pub captures_started: AtomicUsize,
    pub captures_failed: AtomicUsize,
}

impl CoordinatorDiagnostics {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            batches_in: self.batches_in.load(Ordering::Relaxed),
            cycles_accepted: self.cycles_accepted.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            signals_derived: self.signals_derived.load(Ordering::Relaxed),
            utterances_forwarded: self.utterances_forwarded.load(Ordering::Relaxed),
            utterances_debounced: self.utterances_debounced.load(Ordering::Relaxed),
            utterances_mode_gated: self.utterances_mode_gated.load(Ordering::Relaxed),
            commands_parsed: self.commands_parsed.load(Ordering::Relaxed),
            commands_ignored: self.commands_ignored.load(Ordering::Relaxed),
            commands_unrecognized: self.commands_unrecognized.load(Ordering::Relaxed),
            captures_started: self.captures_started.load(Ordering::Relaxed),
            captures_failed: self.captures_failed.load(Ordering::Relaxed),
        }
    }

    fn counters(&self) -> [&AtomicUsize; 12] {
        [
            &self.batches_in,
            &self.cycles_accepted,
            &self.cycles_skipped,
            &self.signals_derived,
            &self.utterances_forwarded,
            &self.utterances_debounced,
            &self.utterances_mode_gated,
            &self.commands_parsed,
            &self.commands_ignored,
            &self.commands_unrecognized,
            &self.captures_started,
            &self.captures_failed,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub batches_in: usize,
    pub cycles_accepted: usize,
    pub cycles_skipped: usize,
    pub signals_derived: usize,
    pub utterances_forwarded: usize,
    pub utterances_debounced: usize,
    pub utterances_mode_gated: usize,
    pub commands_parsed: usize,
    pub commands_ignored: usize,
    pub commands_unrecognized: usize,
    pub captures_started: usize,
    pub captures_failed: usize,
}
