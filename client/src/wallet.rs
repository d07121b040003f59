use std::sync::{Arc, Mutex};

use gridfall_types::Wallet;
use tokio::sync::watch;
use tracing::warn;

/// The single shared wallet instance.
///
/// Every mutation goes through this store's internal lock and is then
/// published to subscribers, so concurrently firing engines serialize on one
/// mutation queue instead of racing on shared state.
pub struct WalletStore {
    inner: Mutex<Wallet>,
    publisher: watch::Sender<Wallet>,
}

impl WalletStore {
    pub fn new(initial: Wallet) -> Arc<Self> {
        let (publisher, _) = watch::channel(initial);
        Arc::new(Self {
            inner: Mutex::new(initial),
            publisher,
        })
    }

    pub fn get(&self) -> Wallet {
        *self.inner.lock().unwrap()
    }

    /// Observable view for UI surfaces and other engines.
    pub fn subscribe(&self) -> watch::Receiver<Wallet> {
        self.publisher.subscribe()
    }

    /// Reconciliation: replace local state with the authoritative
    /// server-returned value.
    pub fn replace(&self, authoritative: Wallet) {
        let mut wallet = self.inner.lock().unwrap();
        *wallet = authoritative;
        self.publisher.send_replace(*wallet);
    }

    /// In-place mutation under the lock; returns the resulting wallet.
    pub fn update(&self, f: impl FnOnce(&mut Wallet)) -> Wallet {
        let mut wallet = self.inner.lock().unwrap();
        f(&mut wallet);
        self.publisher.send_replace(*wallet);
        *wallet
    }

    /// Two-phase helper: snapshot, apply a tentative change, then resolve
    /// with exactly one of [`OptimisticTxn::commit`], [`OptimisticTxn::retain`]
    /// or [`OptimisticTxn::rollback`].
    pub fn begin_optimistic(self: &Arc<Self>, f: impl FnOnce(&mut Wallet)) -> OptimisticTxn {
        let snapshot;
        {
            let mut wallet = self.inner.lock().unwrap();
            snapshot = *wallet;
            f(&mut wallet);
            self.publisher.send_replace(*wallet);
        }
        OptimisticTxn {
            store: Arc::clone(self),
            snapshot,
            resolved: false,
        }
    }
}

/// An unresolved optimistic wallet change. Dropping it unresolved rolls back,
/// so a failure path can never leave a partially-mutated wallet behind.
pub struct OptimisticTxn {
    store: Arc<WalletStore>,
    snapshot: Wallet,
    resolved: bool,
}

impl OptimisticTxn {
    /// The wallet as it was before the tentative change.
    pub fn snapshot(&self) -> Wallet {
        self.snapshot
    }

    /// Reconcile with the authoritative server value.
    pub fn commit(mut self, authoritative: Wallet) {
        self.resolved = true;
        self.store.replace(authoritative);
    }

    /// Keep the tentative value as-is; the caller reconciles later (the spin
    /// engine does this, deferring the authoritative wallet to reveal time).
    pub fn retain(mut self) {
        self.resolved = true;
    }

    /// Restore the snapshot exactly.
    pub fn rollback(mut self) {
        self.resolved = true;
        self.store.replace(self.snapshot);
    }
}

impl Drop for OptimisticTxn {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("optimistic wallet change dropped unresolved; rolling back");
            self.store.replace(self.snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_snapshot_exactly() {
        let store = WalletStore::new(Wallet::new(1000, 0));
        let txn = store.begin_optimistic(|w| w.tickets = w.tickets.saturating_sub(1));
        // Saturating spend: an empty wallet never shows a negative balance.
        assert_eq!(store.get().tickets, 0);
        txn.rollback();
        assert_eq!(store.get(), Wallet::new(1000, 0));
    }

    #[test]
    fn commit_takes_authoritative_value() {
        let store = WalletStore::new(Wallet::new(1000, 5));
        let txn = store.begin_optimistic(|w| w.tickets -= 1);
        assert_eq!(store.get().tickets, 4);
        txn.commit(Wallet::new(1100, 4));
        assert_eq!(store.get(), Wallet::new(1100, 4));
    }

    #[test]
    fn retain_keeps_tentative_value() {
        let store = WalletStore::new(Wallet::new(1000, 5));
        let txn = store.begin_optimistic(|w| w.tickets -= 1);
        txn.retain();
        assert_eq!(store.get().tickets, 4);
    }

    #[test]
    fn drop_unresolved_rolls_back() {
        let store = WalletStore::new(Wallet::new(1000, 5));
        {
            let _txn = store.begin_optimistic(|w| w.tickets -= 1);
            assert_eq!(store.get().tickets, 4);
        }
        assert_eq!(store.get().tickets, 5);
    }

    #[tokio::test]
    async fn subscribers_see_every_replace() {
        let store = WalletStore::new(Wallet::new(0, 0));
        let mut rx = store.subscribe();
        store.replace(Wallet::new(500, 3));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Wallet::new(500, 3));
    }
}
