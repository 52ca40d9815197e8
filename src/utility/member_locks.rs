use serenity::all::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use std::collections::HashMap;
use std::sync::Arc;


/// One async mutex per member. Reactive events and sweeps take the member's
/// lock before touching its records, so work on one member never interleaves
/// while different members proceed in parallel.
#[derive(Clone, Default)]
pub struct MemberLocks {
    locks: Arc<std::sync::Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

/// Proof of exclusive access to one member's records.
pub struct MemberGuard {
    id: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl MemberGuard {
    pub fn id(&self) -> UserId {
        self.id
    }
}

impl MemberLocks {

    pub fn new() -> Self {
        MemberLocks::default()
    }

    pub async fn lock(&self, id: UserId) -> MemberGuard {
        let lock = {
            let mut locks = self.locks.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // drop locks nobody holds or waits for
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        MemberGuard { id, _guard: lock.lock_owned().await }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

}
