//! Persisted key-value state
//!
//! Everything that must survive a restart lives under a handful of well-known keys,
//! each holding one JSON value:
//!
//! | key                   | value                                   |
//! |-----------------------|-----------------------------------------|
//! | `focusHistory`        | `HistoryEntry[]`, newest last, capped   |
//! | `featureHistory`      | `FeatureVector[]`, capped at the window |
//! | `focusMinutes`        | streak counter                          |
//! | `sensitivity`         | `"low" \| "balanced" \| "high"`         |
//! | `userName`            | `{ full, preferred }`                   |
//! | `onboardingCompleted` | bool                                    |
//!
//! Presentation collaborators read and write the same keys; this module only offers
//! typed access to them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DriftError;
use crate::history::HistoryStore;
use crate::types::{FeatureVector, HistoryEntry, Sensitivity};

pub mod keys {
    pub const FOCUS_HISTORY: &str = "focusHistory";
    pub const FEATURE_HISTORY: &str = "featureHistory";
    pub const FOCUS_MINUTES: &str = "focusMinutes";
    pub const SENSITIVITY: &str = "sensitivity";
    pub const USER_NAME: &str = "userName";
    pub const ONBOARDING_COMPLETED: &str = "onboardingCompleted";
}

/// Raw byte-level key-value access
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, DriftError>;

    fn set_raw(&self, key: &str, value: &[u8]) -> Result<(), DriftError>;

    fn remove(&self, key: &str) -> Result<(), DriftError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, DriftError> {
        (**self).get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> Result<(), DriftError> {
        (**self).set_raw(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), DriftError> {
        (**self).remove(key)
    }
}

/// In-process store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, DriftError> {
        Ok(self.values().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> Result<(), DriftError> {
        self.values().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DriftError> {
        self.values().remove(key);
        Ok(())
    }
}

/// Durable store backed by a sled database
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriftError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<(), DriftError> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, DriftError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> Result<(), DriftError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DriftError> {
        self.db.remove(key)?;
        Ok(())
    }
}

/// Display name stored under `userName`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub full: String,
    pub preferred: String,
}

/// Typed accessors over a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct PersistedState<S> {
    store: S,
    history_capacity: usize,
}

impl<S: KeyValueStore> PersistedState<S> {
    pub fn new(store: S, history_capacity: usize) -> Self {
        Self {
            store,
            history_capacity,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DriftError> {
        match self.store.get_raw(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DriftError> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set_raw(key, &bytes)
    }

    pub fn history(&self) -> Result<HistoryStore, DriftError> {
        let entries: Vec<HistoryEntry> = self.get(keys::FOCUS_HISTORY)?.unwrap_or_default();
        Ok(HistoryStore::from_entries(self.history_capacity, entries))
    }

    /// Append one entry, trimming the oldest beyond capacity; returns the new length
    pub fn append_history(&self, entry: HistoryEntry) -> Result<usize, DriftError> {
        let mut history = self.history()?;
        history.append(entry);
        let len = history.len();
        self.set(keys::FOCUS_HISTORY, &history.into_vec())?;
        Ok(len)
    }

    pub fn feature_window(&self) -> Result<Vec<FeatureVector>, DriftError> {
        Ok(self.get(keys::FEATURE_HISTORY)?.unwrap_or_default())
    }

    pub fn save_feature_window(&self, window: &[FeatureVector]) -> Result<(), DriftError> {
        self.set(keys::FEATURE_HISTORY, window)
    }

    pub fn streak(&self) -> Result<u32, DriftError> {
        Ok(self.get(keys::FOCUS_MINUTES)?.unwrap_or(0))
    }

    pub fn save_streak(&self, streak: u32) -> Result<(), DriftError> {
        self.set(keys::FOCUS_MINUTES, &streak)
    }

    /// Stored sensitivity, `balanced` when unset
    pub fn sensitivity(&self) -> Result<Sensitivity, DriftError> {
        Ok(self.get(keys::SENSITIVITY)?.unwrap_or_default())
    }

    pub fn save_sensitivity(&self, sensitivity: Sensitivity) -> Result<(), DriftError> {
        self.set(keys::SENSITIVITY, &sensitivity)
    }

    pub fn user_profile(&self) -> Result<Option<UserProfile>, DriftError> {
        self.get(keys::USER_NAME)
    }

    pub fn save_user_profile(&self, profile: &UserProfile) -> Result<(), DriftError> {
        self.set(keys::USER_NAME, profile)
    }

    pub fn onboarding_completed(&self) -> Result<bool, DriftError> {
        Ok(self.get(keys::ONBOARDING_COMPLETED)?.unwrap_or(false))
    }

    pub fn set_onboarding_completed(&self, done: bool) -> Result<(), DriftError> {
        self.set(keys::ONBOARDING_COMPLETED, &done)
    }

    /// Empty the history and zero the streak
    pub fn clear_history(&self) -> Result<(), DriftError> {
        self.set(keys::FOCUS_HISTORY, &Vec::<HistoryEntry>::new())?;
        self.save_streak(0)
    }
}
