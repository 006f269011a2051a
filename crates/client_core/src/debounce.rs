//! Debounced filter scheduling with last-write-wins delivery.
//!
//! Every submitted query bumps a generation counter and restarts a timer task
//! that sleeps for the quiescence window and then the settle delay. Only a
//! ticket carrying the current generation is ever handed out; older tickets
//! that were already delivered are dropped on read.

use std::time::Duration;

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTicket {
    pub generation: u64,
    pub query: String,
}

pub struct FilterDebouncer {
    runtime: Handle,
    quiescence: Duration,
    settle: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    ticket_tx: mpsc::UnboundedSender<FilterTicket>,
    ticket_rx: mpsc::UnboundedReceiver<FilterTicket>,
}

impl FilterDebouncer {
    /// Timer tasks run on `runtime`, so `submit` may be called from threads
    /// outside it.
    pub fn new(runtime: Handle, quiescence: Duration, settle: Duration) -> Self {
        let (ticket_tx, ticket_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            quiescence,
            settle,
            generation: 0,
            pending: None,
            ticket_tx,
            ticket_rx,
        }
    }

    /// Schedules `query`, superseding whatever was scheduled before.
    pub fn submit(&mut self, query: impl Into<String>) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }

        let query = query.into();
        let ticket_tx = self.ticket_tx.clone();
        let quiescence = self.quiescence;
        let settle = self.settle;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(quiescence).await;
            tokio::time::sleep(settle).await;
            let _ = ticket_tx.send(FilterTicket { generation, query });
        }));
        generation
    }

    /// Returns the current generation's ticket if it has already arrived.
    pub fn try_take_current(&mut self) -> Option<FilterTicket> {
        while let Ok(ticket) = self.ticket_rx.try_recv() {
            if let Some(current) = self.accept(ticket) {
                return Some(current);
            }
        }
        None
    }

    /// Waits for the current generation's ticket.
    ///
    /// Returns `None` when nothing is scheduled.
    pub async fn take_current(&mut self) -> Option<FilterTicket> {
        if self.pending.is_none() {
            return self.try_take_current();
        }
        loop {
            let ticket = self.ticket_rx.recv().await?;
            if let Some(current) = self.accept(ticket) {
                return Some(current);
            }
        }
    }

    fn accept(&mut self, ticket: FilterTicket) -> Option<FilterTicket> {
        if ticket.generation != self.generation {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                query = %ticket.query,
                "discarding stale filter result"
            );
            return None;
        }
        self.pending = None;
        Some(ticket)
    }
}

impl Drop for FilterDebouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
