//! In-flight request deduplication.
//!
//! The first caller for a signature becomes the leader and carries out the
//! network call; every concurrent caller for the same signature becomes a
//! follower and awaits the leader's broadcast outcome. The flight entry is
//! removed at settlement, so callers arriving afterwards start a new
//! flight. A leader dropped before settling (caller cancellation) releases
//! the entry and delivers a cancelled error, so followers never hang.

use crate::error::ApiError;
use crate::transport::RawResponse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// The shared result of one network flight.
pub(crate) type FlightOutcome = Result<RawResponse, ApiError>;

/// What `join` hands back: either the duty to perform the call, or a seat
/// waiting for whoever already is.
pub(crate) enum Flight {
    Leader(FlightGuard),
    Follower(broadcast::Receiver<FlightOutcome>),
}

/// Tracks in-flight GET requests by signature.
pub(crate) struct Deduplicator {
    inflight: Mutex<HashMap<String, broadcast::Sender<FlightOutcome>>>,
}

impl Deduplicator {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Joins the flight for a signature, becoming leader if none is live.
    ///
    /// Registration is atomic under the lock, so two concurrent callers can
    /// never both become leader for the same signature.
    pub(crate) fn join(self: &Arc<Self>, signature: &str) -> Flight {
        let mut inflight = self.inflight.lock().expect("dedup lock poisoned");
        if let Some(sender) = inflight.get(signature) {
            return Flight::Follower(sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        inflight.insert(signature.to_owned(), sender.clone());
        Flight::Leader(FlightGuard {
            dedup: Arc::clone(self),
            signature: signature.to_owned(),
            sender,
            settled: false,
        })
    }

    fn release(&self, signature: &str) {
        self.inflight
            .lock()
            .expect("dedup lock poisoned")
            .remove(signature);
    }
}

/// The leader's handle on a live flight.
///
/// The flight settles exactly once: either through [`settle`] with the real
/// outcome, or through `Drop` with a cancelled error if the leader's future
/// was torn down mid-flight.
///
/// [`settle`]: FlightGuard::settle
pub(crate) struct FlightGuard {
    dedup: Arc<Deduplicator>,
    signature: String,
    sender: broadcast::Sender<FlightOutcome>,
    settled: bool,
}

impl FlightGuard {
    /// Delivers the outcome to every follower and retires the flight.
    ///
    /// The entry is removed before the broadcast, so a caller arriving
    /// after settlement starts a fresh flight rather than observing a
    /// stale one.
    pub(crate) fn settle(mut self, outcome: FlightOutcome) {
        self.settled = true;
        self.dedup.release(&self.signature);
        // Send only fails when no follower is waiting, which is fine.
        let _ = self.sender.send(outcome);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.dedup.release(&self.signature);
            let _ = self.sender.send(Err(ApiError::cancelled()));
        }
    }
}

/// Awaits the leader's outcome from a follower seat.
pub(crate) async fn await_outcome(
    mut receiver: broadcast::Receiver<FlightOutcome>,
) -> FlightOutcome {
    match receiver.recv().await {
        Ok(outcome) => outcome,
        // The sender is gone without a broadcast; treat it as cancellation.
        Err(_) => Err(ApiError::cancelled()),
    }
}
