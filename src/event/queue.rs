use tokio::sync::mpsc;

use super::types::SimEvent;

/// Event queue buffer size
const QUEUE_SIZE: usize = 1000;

/// Creates a new event queue channel pair
pub fn create_event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(QUEUE_SIZE);
    (EventSender(tx), EventReceiver(rx))
}

/// Sender side of the event queue
#[derive(Clone)]
pub struct EventSender(pub mpsc::Sender<SimEvent>);

impl EventSender {
    pub async fn send(&self, event: SimEvent) -> Result<(), mpsc::error::SendError<SimEvent>> {
        self.0.send(event).await
    }

    pub fn inner(&self) -> mpsc::Sender<SimEvent> {
        self.0.clone()
    }
}

/// Receiver side of the event queue
pub struct EventReceiver(pub mpsc::Receiver<SimEvent>);

impl EventReceiver {
    /// Everything queued right now, without waiting
    pub fn drain(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.0.try_recv() {
            events.push(event);
        }
        events
    }
}
