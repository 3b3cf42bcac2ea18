#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use tokio::{sync::broadcast, task::JoinHandle};

use crate::{Event, EventBus};

/// Observational recorder for lifecycle transitions.
///
/// Subscribes to an [`EventBus`] and collects everything it witnesses.
/// It has no behavioral effect on the session: it never publishes, never
/// blocks producers, and its collection task is aborted on drop.
#[derive(Debug)]
pub struct EventLog {
    log: Arc<Mutex<Vec<Event>>>,
    task: JoinHandle<()>,
}

impl EventLog {
    /// Attach a recorder to the bus. Records only events published after
    /// this call.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut rx = bus.subscribe();
        let sink = Arc::clone(&log);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => sink.lock().expect("event log poisoned").push(event),
                    // Dropped events are an observability gap, not an error.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { log, task }
    }

    /// Snapshot of everything recorded so far, in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.log.lock().expect("event log poisoned").clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().expect("event log poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.task.abort();
    }
}
