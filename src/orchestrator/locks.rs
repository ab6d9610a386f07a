//! Per-conversation turn serialization.
//!
//! Concurrent webhook deliveries for the same customer would race on the
//! transcript's read-modify-write. Each (tenant, phone) pair gets its own
//! async mutex; holding the guard makes the whole turn atomic with respect
//! to that conversation.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct TurnLocks {
    inner: Mutex<HashMap<(Uuid, String), Weak<Mutex<()>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one conversation, creating it on first use.
    ///
    /// The map holds weak references; the returned guard keeps its lock
    /// alive, and entries for idle conversations are reaped on the next
    /// acquire so the map tracks only in-flight turns.
    pub async fn acquire(&self, tenant_id: Uuid, phone: &str) -> OwnedMutexGuard<()> {
        let key = (tenant_id, phone.to_string());
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, weak| weak.strong_count() > 0);
            match map.get(&key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    map.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}
