//! Typed event stream delivered from the receive thread to the consumer
//! (§9 design note: preferred over raw callbacks).

use std::sync::mpsc;

/// Default capacity of the bounded event channel `Connection::connect`
/// creates. Generous enough that a slow consumer doesn't stall the
/// receive thread under normal traffic.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum Event {
    Connected,
    Disconnected,
    /// One inbound record, including any TN3270E header and trailing
    /// `IAC EOR`, as delivered to `on_data` in the source callback model.
    DataRecord(Vec<u8>),
    Error(String),
}

pub type EventSender = mpsc::SyncSender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

/// Create the bounded channel a `Connection` uses to publish events.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::sync_channel(CHANNEL_CAPACITY)
}
