//! Store wrappers for exercising concurrency and failure paths.
//!
//! - [`GatedStore`] holds concurrent vault reads at a barrier so that racing
//!   writers provably start from the same map, can park a single read until
//!   the test lets it go, and records every whole-map write in order.
//! - [`FailingStore`] makes the key store unreachable on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{oneshot, Barrier};

use hearthkey_core::{
    Household, HouseholdId, UserId, UserKeyRecord, UserProfile, WrappedKey, WrappedKeyMap,
};
use hearthkey_store::{InsertResult, KeyStore, MembershipDirectory, Result, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Gated store
// ─────────────────────────────────────────────────────────────────────────────

/// A key store whose full-map reads can be made to rendezvous.
///
/// After [`arm`](GatedStore::arm) with `n`, the next `n` calls to
/// `list_member_keys` each take their snapshot and then wait until all `n`
/// have done so. None of them can write before every one has read.
///
/// After [`hold_next_read`](GatedStore::hold_next_read), the next
/// `list_member_keys` takes its snapshot and then waits until the returned
/// [`HeldRead`] is released, so the test can commit other writes in between.
pub struct GatedStore<S> {
    inner: Arc<S>,
    barrier: Mutex<Option<Arc<Barrier>>>,
    remaining: AtomicUsize,
    hold: Mutex<Option<ReadHold>>,
    replaced: Mutex<Vec<WrappedKeyMap>>,
}

/// The store's side of a held read.
struct ReadHold {
    taken: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// The test's side of a held read.
pub struct HeldRead {
    taken: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl HeldRead {
    /// Wait until the held read has taken its snapshot.
    pub async fn snapshot_taken(&mut self) {
        // A dropped store means the read will never come.
        let _ = (&mut self.taken).await;
    }

    /// Let the held read return its snapshot.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl<S: KeyStore> GatedStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            barrier: Mutex::new(None),
            remaining: AtomicUsize::new(0),
            hold: Mutex::new(None),
            replaced: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `parties` full-map reads wait for each other.
    pub fn arm(&self, parties: usize) {
        let mut barrier = self.barrier.lock().unwrap_or_else(PoisonError::into_inner);
        *barrier = Some(Arc::new(Barrier::new(parties)));
        self.remaining.store(parties, Ordering::SeqCst);
    }

    /// Park the next full-map read after its snapshot until released.
    pub fn hold_next_read(&self) -> HeldRead {
        let (taken_tx, taken_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.hold.lock().unwrap_or_else(PoisonError::into_inner) = Some(ReadHold {
            taken: taken_tx,
            release: release_rx,
        });
        HeldRead {
            taken: taken_rx,
            release: release_tx,
        }
    }

    /// Every map passed to `replace_member_keys`, in write order.
    pub fn replaced_maps(&self) -> Vec<WrappedKeyMap> {
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_gate(&self) -> Option<Arc<Barrier>> {
        let claimed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !claimed {
            return None;
        }
        self.barrier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_hold(&self) -> Option<ReadHold> {
        self.hold.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl<S: KeyStore + 'static> KeyStore for GatedStore<S> {
    async fn get_user_keys(&self, user_id: &UserId) -> Result<Option<UserKeyRecord>> {
        self.inner.get_user_keys(user_id).await
    }

    async fn insert_user_keys(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        self.inner.insert_user_keys(record).await
    }

    async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<Option<WrappedKey>> {
        self.inner.get_member_key(household_id, member_id).await
    }

    async fn list_member_keys(&self, household_id: &HouseholdId) -> Result<WrappedKeyMap> {
        let snapshot = self.inner.list_member_keys(household_id).await?;
        if let Some(barrier) = self.take_gate() {
            barrier.wait().await;
        } else if let Some(hold) = self.take_hold() {
            let _ = hold.taken.send(());
            let _ = hold.release.await;
        }
        Ok(snapshot)
    }

    async fn put_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
        wrapped_key: &WrappedKey,
    ) -> Result<()> {
        self.inner
            .put_member_key(household_id, member_id, wrapped_key)
            .await
    }

    async fn delete_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<bool> {
        self.inner.delete_member_key(household_id, member_id).await
    }

    async fn replace_member_keys(
        &self,
        household_id: &HouseholdId,
        keys: &WrappedKeyMap,
    ) -> Result<()> {
        self.inner.replace_member_keys(household_id, keys).await?;
        self.replaced
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?
            .push(keys.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failing store
// ─────────────────────────────────────────────────────────────────────────────

/// A store that can be switched into failure.
///
/// While failing, every key store call returns
/// [`StoreError::Unavailable`]; the directory keeps working unless
/// `fail_directory` is also set.
pub struct FailingStore<S> {
    inner: Arc<S>,
    fail_keys: AtomicBool,
    fail_directory: AtomicBool,
}

impl<S> FailingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            fail_keys: AtomicBool::new(false),
            fail_directory: AtomicBool::new(false),
        }
    }

    pub fn set_fail_keys(&self, failing: bool) {
        self.fail_keys.store(failing, Ordering::SeqCst);
    }

    pub fn set_fail_directory(&self, failing: bool) {
        self.fail_directory.store(failing, Ordering::SeqCst);
    }

    fn check_keys(&self) -> Result<()> {
        if self.fail_keys.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("key store offline".into()))
        } else {
            Ok(())
        }
    }

    fn check_directory(&self) -> Result<()> {
        if self.fail_directory.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("directory offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: KeyStore + 'static> KeyStore for FailingStore<S> {
    async fn get_user_keys(&self, user_id: &UserId) -> Result<Option<UserKeyRecord>> {
        self.check_keys()?;
        self.inner.get_user_keys(user_id).await
    }

    async fn insert_user_keys(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        self.check_keys()?;
        self.inner.insert_user_keys(record).await
    }

    async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<Option<WrappedKey>> {
        self.check_keys()?;
        self.inner.get_member_key(household_id, member_id).await
    }

    async fn list_member_keys(&self, household_id: &HouseholdId) -> Result<WrappedKeyMap> {
        self.check_keys()?;
        self.inner.list_member_keys(household_id).await
    }

    async fn put_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
        wrapped_key: &WrappedKey,
    ) -> Result<()> {
        self.check_keys()?;
        self.inner
            .put_member_key(household_id, member_id, wrapped_key)
            .await
    }

    async fn delete_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<bool> {
        self.check_keys()?;
        self.inner.delete_member_key(household_id, member_id).await
    }

    async fn replace_member_keys(
        &self,
        household_id: &HouseholdId,
        keys: &WrappedKeyMap,
    ) -> Result<()> {
        self.check_keys()?;
        self.inner.replace_member_keys(household_id, keys).await
    }
}

#[async_trait]
impl<S: MembershipDirectory + 'static> MembershipDirectory for FailingStore<S> {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        self.check_directory()?;
        self.inner.get_user(user_id).await
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        self.check_directory()?;
        self.inner.upsert_user(profile).await
    }

    async fn get_household(&self, household_id: &HouseholdId) -> Result<Option<Household>> {
        self.check_directory()?;
        self.inner.get_household(household_id).await
    }

    async fn create_household(&self, household: &Household) -> Result<()> {
        self.check_directory()?;
        self.inner.create_household(household).await
    }

    async fn add_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        self.check_directory()?;
        self.inner.add_member(household_id, user_id).await
    }

    async fn remove_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        self.check_directory()?;
        self.inner.remove_member(household_id, user_id).await
    }

    async fn delete_household(&self, household_id: &HouseholdId) -> Result<bool> {
        self.check_directory()?;
        self.inner.delete_household(household_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthkey_store::MemoryStore;

    fn hid() -> HouseholdId {
        HouseholdId::new("h1").unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_armed_reads_see_the_same_snapshot() {
        let store = Arc::new(GatedStore::new(Arc::new(MemoryStore::new())));
        store.arm(2);

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.list_member_keys(&hid()).await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.list_member_keys(&hid()).await })
        };

        let (a, b) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());
        assert_eq!(a, b);

        // Disarmed once both parties passed.
        assert!(store.list_member_keys(&hid()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_held_read_returns_its_snapshot_after_release() {
        let store = Arc::new(GatedStore::new(Arc::new(MemoryStore::new())));
        let mut hold = store.hold_next_read();

        let read = {
            let store = store.clone();
            tokio::spawn(async move { store.list_member_keys(&hid()).await })
        };
        hold.snapshot_taken().await;

        // Committed while the read is parked: not part of its snapshot.
        store
            .put_member_key(&hid(), &UserId::new("a").unwrap(), &WrappedKey::new("w"))
            .await
            .unwrap();
        hold.release();

        assert!(read.await.unwrap().unwrap().is_empty());
        assert_eq!(store.list_member_keys(&hid()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replaced_maps_are_recorded() {
        let store = GatedStore::new(Arc::new(MemoryStore::new()));
        let mut map = WrappedKeyMap::new();
        map.insert(UserId::new("a").unwrap(), WrappedKey::new("w"));
        store.replace_member_keys(&hid(), &map).await.unwrap();
        assert_eq!(store.replaced_maps(), vec![map]);
    }

    #[tokio::test]
    async fn test_failing_store_toggles() {
        let store = FailingStore::new(Arc::new(MemoryStore::new()));
        assert!(store.list_member_keys(&hid()).await.is_ok());

        store.set_fail_keys(true);
        assert!(matches!(
            store.list_member_keys(&hid()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.get_household(&hid()).await.is_ok());

        store.set_fail_directory(true);
        assert!(store.get_household(&hid()).await.is_err());
    }
}
