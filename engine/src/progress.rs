//! Progress reporting contract.
//!
//! This module defines the ProgressSink trait, which decouples the engine
//! from any presentation layer. The engine emits exactly one `Start`, one
//! `Item` per task or archive member, and exactly one `Finish`, always from a
//! single thread. Sinks own whatever state they render from; `ProgressTally`
//! is the shared state value most of them want.

use crossbeam_channel::Sender;
use serde::Serialize;

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Emitted once, before any item
    Start { file_count: usize, total_bytes: u64 },
    /// Emitted once per task/member; `bytes == 0` for failed tasks and directories
    Item { bytes: u64 },
    /// Emitted once, after the last item
    Finish,
}

/// Trait for receiving progress events from a run.
///
/// CLI and GUI front ends are interchangeable implementations. All methods
/// are called from the engine's coordinating thread, never from workers.
pub trait ProgressSink: Send {
    fn on_start(&self, file_count: usize, total_bytes: u64);

    fn on_item(&self, bytes: u64);

    fn on_finish(&self);
}

/// Dispatch an event to an optional sink.
pub(crate) fn emit(sink: Option<&dyn ProgressSink>, event: ProgressEvent) {
    let Some(sink) = sink else {
        return;
    };
    match event {
        ProgressEvent::Start {
            file_count,
            total_bytes,
        } => sink.on_start(file_count, total_bytes),
        ProgressEvent::Item { bytes } => sink.on_item(bytes),
        ProgressEvent::Finish => sink.on_finish(),
    }
}

/// Aggregated progress state, updated one event at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub file_count: usize,
    pub total_bytes: u64,
    pub items_done: usize,
    pub bytes_done: u64,
    /// Items that reported zero bytes (failed tasks or directories)
    pub zero_byte_items: usize,
    pub started: bool,
    pub finished: bool,
}

impl ProgressTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::Start {
                file_count,
                total_bytes,
            } => {
                *self = ProgressTally {
                    file_count,
                    total_bytes,
                    started: true,
                    ..ProgressTally::default()
                };
            }
            ProgressEvent::Item { bytes } => {
                self.items_done += 1;
                self.bytes_done = self.bytes_done.saturating_add(bytes);
                if bytes == 0 {
                    self.zero_byte_items += 1;
                }
            }
            ProgressEvent::Finish => self.finished = true,
        }
    }

    /// Fraction of items processed, in `[0, 1]`.
    pub fn file_fraction(&self) -> f64 {
        if self.file_count == 0 {
            return 0.0;
        }
        (self.items_done as f64 / self.file_count as f64).min(1.0)
    }

    /// Fraction of bytes processed, in `[0, 1]`.
    pub fn byte_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// A ProgressSink that forwards events into a channel.
///
/// A single consumer (a GUI event loop, a test) drains the receiver, usually
/// into a `ProgressTally`. Sends to a dropped receiver are ignored.
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        ChannelSink { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn on_start(&self, file_count: usize, total_bytes: u64) {
        let _ = self.sender.send(ProgressEvent::Start {
            file_count,
            total_bytes,
        });
    }

    fn on_item(&self, bytes: u64) {
        let _ = self.sender.send(ProgressEvent::Item { bytes });
    }

    fn on_finish(&self) {
        let _ = self.sender.send(ProgressEvent::Finish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_tally_tracks_items_and_bytes() {
        let mut tally = ProgressTally::new();
        tally.apply(&ProgressEvent::Start {
            file_count: 3,
            total_bytes: 60,
        });
        tally.apply(&ProgressEvent::Item { bytes: 10 });
        tally.apply(&ProgressEvent::Item { bytes: 0 });

        assert!(tally.started);
        assert!(!tally.finished);
        assert_eq!(tally.items_done, 2);
        assert_eq!(tally.bytes_done, 10);
        assert_eq!(tally.zero_byte_items, 1);

        tally.apply(&ProgressEvent::Finish);
        assert!(tally.finished);
    }

    #[test]
    fn test_tally_fractions_with_empty_run() {
        let mut tally = ProgressTally::new();
        tally.apply(&ProgressEvent::Start {
            file_count: 0,
            total_bytes: 0,
        });
        assert_eq!(tally.file_fraction(), 0.0);
        assert_eq!(tally.byte_fraction(), 0.0);
    }

    #[test]
    fn test_tally_start_resets_previous_run() {
        let mut tally = ProgressTally::new();
        tally.apply(&ProgressEvent::Start {
            file_count: 1,
            total_bytes: 5,
        });
        tally.apply(&ProgressEvent::Item { bytes: 5 });
        tally.apply(&ProgressEvent::Finish);
        tally.apply(&ProgressEvent::Start {
            file_count: 2,
            total_bytes: 8,
        });
        assert_eq!(tally.items_done, 0);
        assert_eq!(tally.bytes_done, 0);
        assert!(!tally.finished);
        assert_eq!(tally.file_count, 2);
    }

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (tx, rx) = unbounded();
        let sink = ChannelSink::new(tx);
        emit(Some(&sink), ProgressEvent::Start { file_count: 1, total_bytes: 4 });
        emit(Some(&sink), ProgressEvent::Item { bytes: 4 });
        emit(Some(&sink), ProgressEvent::Finish);
        drop(sink);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                ProgressEvent::Start { file_count: 1, total_bytes: 4 },
                ProgressEvent::Item { bytes: 4 },
                ProgressEvent::Finish,
            ]
        );

        let mut tally = ProgressTally::new();
        events.iter().for_each(|e| tally.apply(e));
        assert_eq!(tally.byte_fraction(), 1.0);
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = unbounded();
        drop(rx);
        let sink = ChannelSink::new(tx);
        sink.on_item(1);
        sink.on_finish();
    }
}
