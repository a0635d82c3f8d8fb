//! Single-flight request gates.
//!
//! A [`Flight`] admits at most one outstanding request of its kind. The gate is
//! closed by [`Flight::begin`] and reopened either when the matching response is
//! applied ([`Flight::settle`]) or when the owner cancels it. Workers started
//! through [`spawn`] always report back, turning errors and panics into a failed
//! result, so a gate cannot stay closed after its request is gone.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct Ticket {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct Flight {
    next_id: u64,
    pending: Option<Ticket>,
}

impl Flight {
    /// Closes the gate and returns a ticket, or `None` when a request is already out.
    pub fn begin(&mut self) -> Option<Ticket> {
        if self.pending.is_some() {
            return None;
        }
        self.next_id = self.next_id.wrapping_add(1);
        let ticket = Ticket {
            id: self.next_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        self.pending = Some(ticket.clone());
        Some(ticket)
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Reopens the gate if `request_id` is the outstanding request.
    /// Returns false for stale or cancelled responses, which must be dropped.
    pub fn settle(&mut self, request_id: u64) -> bool {
        match &self.pending {
            Some(ticket) if ticket.id == request_id && !ticket.is_cancelled() => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(ticket) = self.pending.take() {
            debug!(request_id = ticket.id, "cancelling in-flight request");
            ticket.cancel();
        }
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `job`, converting a panic into an error.
pub fn run_settled<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|_| {
        error!("request worker panicked");
        Err(anyhow!("request worker panicked"))
    })
}

/// Runs `job` on a worker thread and sends `wrap(request_id, result)` back,
/// unless the ticket was cancelled in the meantime.
pub fn spawn<M, T, F, W>(ticket: Ticket, tx: &Sender<M>, job: F, wrap: W)
where
    M: Send + 'static,
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    W: FnOnce(u64, Result<T>) -> M + Send + 'static,
{
    let tx = tx.clone();
    thread::spawn(move || {
        if ticket.is_cancelled() {
            return;
        }
        let result = run_settled(job);
        if ticket.is_cancelled() {
            return;
        }
        let _ = tx.send(wrap(ticket.id(), result));
    });
}

/// Unguarded variant for one-shot mutations that need no gate.
pub fn spawn_detached<M, T, F, W>(tx: &Sender<M>, job: F, wrap: W)
where
    M: Send + 'static,
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    W: FnOnce(Result<T>) -> M + Send + 'static,
{
    let tx = tx.clone();
    thread::spawn(move || {
        let result = run_settled(job);
        let _ = tx.send(wrap(result));
    });
}
