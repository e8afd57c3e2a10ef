//! One-way progress reporting from a running bootload to whoever displays it

use std::sync::mpsc::{self, Receiver, SyncSender};

use log::trace;

/// The default number of events that can be queued before the bootload blocks on the consumer
pub const DEFAULT_PROGRESS_BOUND: usize = 64;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProgressEvent {
    /// Total number of progress units for the whole bootload, sent once before any data moves
    Sizing(u64),
    /// Human readable status, e.g. "Writing Page 3"
    Status(String),
    /// Absolute number of progress units done so far
    Bytes(u64),
    /// The bootload completed; nothing follows
    Finished,
}

/// Producer half of a progress channel.
///
/// Dropping it closes the channel.
#[derive(Debug)]
pub struct Progress {
    sender: Option<SyncSender<ProgressEvent>>,
}

/// Creates a bounded progress channel
pub fn channel(bound: usize) -> (Progress, Receiver<ProgressEvent>) {
    let (sender, receiver) = mpsc::sync_channel(bound);

    (
        Progress {
            sender: Some(sender),
        },
        receiver,
    )
}

impl Progress {
    /// Returns a `Progress` that discards every event
    pub fn disabled() -> Progress {
        Progress { sender: None }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                trace!("Progress receiver hung up, dropping event");
            }
        }
    }

    pub fn sizing(&self, total: u64) {
        self.send(ProgressEvent::Sizing(total));
    }

    pub fn status<S: Into<String>>(&self, status: S) {
        self.send(ProgressEvent::Status(status.into()));
    }

    pub fn bytes(&self, done: u64) {
        self.send(ProgressEvent::Bytes(done));
    }

    /// Sends the terminal `Finished` event and closes the channel
    pub fn finish(self) {
        self.send(ProgressEvent::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_deliver_events_in_order_and_close() {
        let (progress, receiver) = channel(8);

        progress.sizing(100);
        progress.status("Writing Page 0");
        progress.bytes(64);
        progress.finish();

        let events: Vec<ProgressEvent> = receiver.iter().collect();

        assert_eq!(
            events,
            vec![
                ProgressEvent::Sizing(100),
                ProgressEvent::Status("Writing Page 0".to_string()),
                ProgressEvent::Bytes(64),
                ProgressEvent::Finished,
            ]
        );
    }

    #[test]
    fn it_should_ignore_a_hung_up_receiver() {
        let (progress, receiver) = channel(1);
        drop(receiver);

        progress.status("nobody is listening");
        progress.finish();
    }

    #[test]
    fn it_should_discard_events_when_disabled() {
        let progress = Progress::disabled();

        progress.bytes(1);
        progress.finish();
    }
}
