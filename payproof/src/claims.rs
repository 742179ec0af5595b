//! Atomic replay/idempotency guard keyed by (chain, tx hash).
//!
//! A claim is an exclusive reservation of a (chain, transaction) pair.
//! Insertion goes through the map's shard-locked entry API — a single
//! atomic check-and-insert, never read-then-write — so concurrent
//! verifications of the same transaction race safely: exactly one caller
//! wins the claim and mints a grant, every other caller waits for that
//! grant and receives the identical value.
//!
//! Within the idempotency window a fulfilled claim replays the original
//! grant (safe retry after a lost response); once the window elapses the
//! transaction is rejected outright and can never buy a second grant.
//! The grant is retained in the claim record only for the window's
//! lifetime — durable token state stores the hash, never the plaintext.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::chain::ChainId;

type ClaimKey = (ChainId, String);

#[derive(Debug)]
struct ClaimCell<G> {
    notify: Notify,
    slot: OnceLock<G>,
}

#[derive(Debug)]
struct ClaimRecord<G> {
    claimed_at: Instant,
    cell: Arc<ClaimCell<G>>,
}

/// Outcome of a claim attempt.
#[derive(Debug)]
pub enum ClaimDecision<G> {
    /// This caller won the claim and must mint the grant, then
    /// [`ClaimTicket::fulfill`] it.
    Granted(ClaimTicket<G>),
    /// The transaction was already claimed inside the idempotency window;
    /// here is the original grant.
    Replay(G),
    /// The transaction was claimed and the window has elapsed.
    Rejected,
}

/// Status of an existing claim, observed without inserting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus<G> {
    /// Fulfilled inside the idempotency window.
    Replay(G),
    /// Fulfilled, window elapsed.
    Expired,
}

/// The winner's obligation: fulfill the claim with the minted grant.
///
/// Dropping the ticket without fulfilling it removes the claim record and
/// wakes waiting callers, so a failed or panicked issuance never wedges
/// concurrent verifications of the same transaction.
#[derive(Debug)]
pub struct ClaimTicket<G> {
    claims: Arc<DashMap<ClaimKey, ClaimRecord<G>>>,
    key: ClaimKey,
    cell: Arc<ClaimCell<G>>,
    fulfilled: bool,
}

impl<G> ClaimTicket<G> {
    /// Publishes the minted grant to the claim record and wakes waiters.
    pub fn fulfill(mut self, grant: G) {
        let _ = self.cell.slot.set(grant);
        self.fulfilled = true;
        self.cell.notify.notify_waiters();
    }
}

impl<G> Drop for ClaimTicket<G> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.claims.remove(&self.key);
            self.cell.notify.notify_waiters();
        }
    }
}

/// Shared claim store for all chains.
#[derive(Debug)]
pub struct ClaimStore<G> {
    window: Duration,
    claims: Arc<DashMap<ClaimKey, ClaimRecord<G>>>,
}

impl<G: Clone> ClaimStore<G> {
    /// Creates a claim store with the given idempotency window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            claims: Arc::new(DashMap::new()),
        }
    }

    /// Attempts to claim `(chain, tx_hash)`.
    ///
    /// If another caller holds a not-yet-fulfilled claim for the same key,
    /// this waits until that claim is fulfilled (returning a replay) or
    /// aborted (retrying the insert).
    pub async fn claim(&self, chain: &ChainId, tx_hash: &str) -> ClaimDecision<G> {
        loop {
            let key = (chain.clone(), tx_hash.to_owned());
            let cell = match self.claims.entry(key.clone()) {
                Entry::Vacant(vacant) => {
                    let cell = Arc::new(ClaimCell {
                        notify: Notify::new(),
                        slot: OnceLock::new(),
                    });
                    vacant.insert(ClaimRecord {
                        claimed_at: Instant::now(),
                        cell: Arc::clone(&cell),
                    });
                    return ClaimDecision::Granted(ClaimTicket {
                        claims: Arc::clone(&self.claims),
                        key,
                        cell,
                        fulfilled: false,
                    });
                }
                Entry::Occupied(occupied) => {
                    let record = occupied.get();
                    if let Some(grant) = record.cell.slot.get() {
                        return if record.claimed_at.elapsed() <= self.window {
                            ClaimDecision::Replay(grant.clone())
                        } else {
                            ClaimDecision::Rejected
                        };
                    }
                    Arc::clone(&record.cell)
                }
            };

            // Another caller is minting. Wait for fulfillment; if the
            // winner aborts, retry the insert from scratch.
            loop {
                let notified = cell.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(grant) = cell.slot.get() {
                    return ClaimDecision::Replay(grant.clone());
                }
                if !self.claims.contains_key(&key) {
                    break;
                }
                notified.await;
            }
        }
    }

    /// Observes the status of an existing claim without inserting one.
    ///
    /// Returns `None` when the key is unclaimed or a claim is still being
    /// fulfilled.
    #[must_use]
    pub fn peek(&self, chain: &ChainId, tx_hash: &str) -> Option<ClaimStatus<G>> {
        let key = (chain.clone(), tx_hash.to_owned());
        let record = self.claims.get(&key)?;
        let grant = record.cell.slot.get()?;
        if record.claimed_at.elapsed() <= self.window {
            Some(ClaimStatus::Replay(grant.clone()))
        } else {
            Some(ClaimStatus::Expired)
        }
    }

    /// Drops fulfilled claims older than `max_age`.
    ///
    /// Safe once `max_age` exceeds the chains' maximum accepted
    /// transaction age: any replay of such a transaction is independently
    /// rejected as stale.
    pub fn prune(&self, max_age: Duration) {
        self.claims.retain(|_, record| {
            record.cell.slot.get().is_none() || record.claimed_at.elapsed() <= max_age
        });
    }

    /// Number of live claim records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if no claims are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
