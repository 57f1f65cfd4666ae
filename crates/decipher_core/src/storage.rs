//! crates/decipher_core/src/storage.rs
//!
//! In-memory `SessionStorage`, used by tests and by callers that do not want
//! the session to outlive the process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::ports::{PortError, PortResult, SessionStorage, Slot};

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slots: RwLock<HashMap<Slot, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-filled with raw slot values.
    pub fn with_slots(user: Option<&str>, token: Option<&str>) -> Self {
        let mut slots = HashMap::new();
        if let Some(user) = user {
            slots.insert(Slot::User, user.to_string());
        }
        if let Some(token) = token {
            slots.insert(Slot::Token, token.to_string());
        }
        Self {
            slots: RwLock::new(slots),
        }
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn read(&self, slot: Slot) -> PortResult<Option<String>> {
        let guard = self
            .slots
            .read()
            .map_err(|e| PortError::Storage(format!("Lock poisoned: {e}")))?;
        Ok(guard.get(&slot).cloned())
    }

    async fn write(&self, slot: Slot, value: &str) -> PortResult<()> {
        let mut guard = self
            .slots
            .write()
            .map_err(|e| PortError::Storage(format!("Lock poisoned: {e}")))?;
        guard.insert(slot, value.to_string());
        Ok(())
    }

    async fn remove(&self, slot: Slot) -> PortResult<()> {
        let mut guard = self
            .slots
            .write()
            .map_err(|e| PortError::Storage(format!("Lock poisoned: {e}")))?;
        guard.remove(&slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slots_are_independent() {
        let storage = MemorySessionStorage::new();
        storage.write(Slot::Token, "abc").await.unwrap();

        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("abc"));
        assert!(storage.read(Slot::User).await.unwrap().is_none());

        storage.remove(Slot::Token).await.unwrap();
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
    }
}
