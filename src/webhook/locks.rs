use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per patient phone number. Entries are dropped once no
/// task holds or waits on them.
#[derive(Default)]
pub struct PatientLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

pub struct PatientGuard<'a> {
    key: String,
    locks: &'a PatientLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PatientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> PatientGuard<'_> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(map.entry(key.to_string()).or_default())
        };

        let guard = mutex.lock_owned().await;
        PatientGuard {
            key: key.to_string(),
            locks: self,
            guard: Some(guard),
        }
    }

    /// Keys currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PatientGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.locks.inner.lock().unwrap_or_else(|p| p.into_inner());
        // Only the map itself still holds the mutex: nobody is waiting.
        if map
            .get(&self.key)
            .map(|m| Arc::strong_count(m) == 1)
            .unwrap_or(false)
        {
            map.remove(&self.key);
        }
    }
}
