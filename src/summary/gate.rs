//! At most one summary request is live at a time.
//!
//! [`SummaryGate::begin`] hands out a [`Ticket`] and signals the previous
//! ticket, if still live, through its `watch` channel. The holder of that older
//! ticket observes [`Ticket::superseded`] and resolves to `Superseded`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

struct InFlight {
    id: u64,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
pub struct SummaryGate {
    next_id: AtomicU64,
    current: Mutex<Option<InFlight>>,
}

/// Handle for one request registered with a [`SummaryGate`].
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    cancelled: watch::Receiver<bool>,
}

impl SummaryGate {
    fn current(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new request, superseding the live one.
    pub fn begin(&self) -> Ticket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel, cancelled) = watch::channel(false);

        if let Some(previous) = self.current().replace(InFlight { id, cancel }) {
            tracing::debug!(superseded = previous.id, by = id, "Superseding summary request");
            previous.cancel.send_replace(true);
        }

        Ticket { id, cancelled }
    }

    /// Deregister a request that has resolved. No-op if it was already superseded.
    pub fn finish(&self, ticket: &Ticket) {
        let mut current = self.current();
        if current.as_ref().is_some_and(|f| f.id == ticket.id) {
            *current = None;
        }
    }

    /// Cancel the live request. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        match self.current().take() {
            Some(live) => {
                live.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Id of the live request.
    pub fn in_flight(&self) -> Option<u64> {
        self.current().as_ref().map(|f| f.id)
    }
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_superseded(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the ticket is superseded or cancelled; never otherwise.
    pub async fn superseded(&mut self) {
        if self.cancelled.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_supersedes_previous() {
        let gate = SummaryGate::default();
        let first = gate.begin();
        assert_eq!(gate.in_flight(), Some(first.id()));
        assert!(!first.is_superseded());

        let second = gate.begin();
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert_eq!(gate.in_flight(), Some(second.id()));
    }

    #[test]
    fn test_finish_only_clears_own_ticket() {
        let gate = SummaryGate::default();
        let first = gate.begin();
        let second = gate.begin();

        gate.finish(&first);
        assert_eq!(gate.in_flight(), Some(second.id()));
        gate.finish(&second);
        assert_eq!(gate.in_flight(), None);
    }

    #[tokio::test]
    async fn test_superseded_resolves_after_cancel() {
        let gate = SummaryGate::default();
        let mut ticket = gate.begin();
        assert!(gate.cancel());
        ticket.superseded().await;
        assert!(ticket.is_superseded());
        assert!(!gate.cancel());
    }
}
