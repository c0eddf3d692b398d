//! Progress events handed from the worker thread to the presentation thread
//!
//! The worker never touches presentation state directly: it pushes
//! `ProgressEvent`s into a channel and the front-end renders them on its
//! own thread.

use serde::Serialize;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

/// Handle the orchestration reports progress through.
///
/// Percentages are clamped monotonically: a step can never move the bar
/// backwards mid-run. The only exception is `reset`, used when the run
/// falls over into the salvage path.
#[derive(Default)]
pub struct Progress {
    tx: Option<Sender<ProgressEvent>>,
    last: u8,
}

impl Progress {
    /// Progress reported through a channel
    pub fn channel(tx: Sender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            last: 0,
        }
    }

    /// Progress that discards all events (tests, quiet mode)
    pub fn sink() -> Self {
        Self::default()
    }

    pub fn set(&mut self, percent: u8, message: impl Into<String>) {
        let percent = percent.clamp(self.last, 100);
        self.last = percent;
        self.emit(percent, message.into());
    }

    /// Drop back to zero for the salvage pass
    pub fn reset(&mut self, message: impl Into<String>) {
        self.last = 0;
        self.emit(0, message.into());
    }

    fn emit(&self, percent: u8, message: String) {
        if let Some(tx) = &self.tx {
            // A closed receiver just means the front-end went away.
            let _ = tx.send(ProgressEvent { percent, message });
        }
    }
}
