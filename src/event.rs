use crate::serial::SerialEvent;
use crate::timer::TickSource;

/// Notifications sent from background threads to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Serial(SerialEvent),
    Tick(TickSource),
}

pub type EventSender = crossbeam_channel::Sender<Event>;
pub type EventReceiver = crossbeam_channel::Receiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    crossbeam_channel::unbounded()
}
