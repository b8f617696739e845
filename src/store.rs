//! Durable, namespaced session storage
//!
//! A [`SessionStore`] wraps any string key-value backend and exposes typed,
//! best-effort accessors. Every key it writes is prefixed with a namespace
//! built from the quiz id, so state written for one catalog is never read
//! back by another. Failures are logged and swallowed: a broken backend
//! degrades the session to in-memory only, it never stops it.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use derive_where::derive_where;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

use crate::{constants::storage::PREFIX, timer::EpochMillis, timer::Phase};

/// Errors raised by a storage backend or by value encoding
#[derive(Error, Debug)]
pub enum Error {
    /// The backend refused the operation
    #[error("storage backend failed: {0}")]
    Backend(String),
    /// A value could not be encoded for storage
    #[error("failed to encode {key}: {source}")]
    Encode {
        /// Key being written
        key: String,
        /// Underlying serializer error
        source: serde_json::Error,
    },
    /// A stored value could not be decoded
    #[error("stored value under {key} is malformed: {source}")]
    Decode {
        /// Key being read
        key: String,
        /// Underlying deserializer error
        source: serde_json::Error,
    },
}

/// A string key-value backend, such as browser local storage
pub trait KeyValueStore {
    /// Reads the value under `key`
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Writes `value` under `key`
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the write (e.g. quota).
    fn set(&mut self, key: &str, value: String) -> Result<(), Error>;

    /// Deletes `key`; deleting a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the deletion.
    fn remove(&mut self, key: &str) -> Result<(), Error>;

    /// Lists every key currently held
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be enumerated.
    fn keys(&self) -> Result<Vec<String>, Error>;
}

/// An in-memory backend
///
/// Clones share the same map, so dropping a session and building another
/// over a clone behaves like a page reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Rc<RefCell<HashMap<String, String>>>);

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        self.0.borrow_mut().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.0.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.0.borrow().keys().cloned().collect())
    }
}

/// The individually addressable pieces of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Key {
    /// Current stage
    #[display("stage")]
    Stage,
    /// Current round index
    #[display("index")]
    Index,
    /// Player name and tallies
    #[display("player")]
    Player,
    /// Power-up state
    #[display("power_up")]
    PowerUp,
    /// Per-round outcomes
    #[display("outcomes")]
    Outcomes,
    /// Per-round raw answers
    #[display("raw_answers")]
    RawAnswers,
    /// Final round stake
    #[display("wager")]
    Wager,
    /// Whether the previous scored event was correct
    #[display("last_correct")]
    LastCorrect,
    /// Run start time
    #[display("started_at")]
    StartedAt,
    /// Run id
    #[display("run_id")]
    RunId,
    /// Whether the name-change notification fired
    #[display("name_announced")]
    NameAnnounced,
    /// Whether the finished run was reported
    #[display("finish_reported")]
    FinishReported,
    /// Ordered round ids of the catalog the state was written for
    #[display("catalog")]
    CatalogSignature,
    /// Deadline of a phase of a round
    #[display("deadline:{_0}:{_1}")]
    Deadline(Phase, usize),
}

/// Typed, namespaced access to a backend
#[derive_where(Debug)]
pub struct SessionStore<S> {
    namespace: String,
    #[derive_where(skip)]
    backend: S,
    written: BTreeSet<String>,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Wraps `backend`, scoping every key under `quiz_id`
    pub fn new(backend: S, quiz_id: &str) -> Self {
        Self {
            namespace: format!("{PREFIX}:{quiz_id}"),
            backend,
            written: BTreeSet::new(),
        }
    }

    /// The prefix shared by this session's keys
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: Key) -> String {
        format!("{}:{key}", self.namespace)
    }

    /// Reads and decodes `key`
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or the value is malformed.
    pub fn try_load<T: DeserializeOwned>(&self, key: Key) -> Result<Option<T>, Error> {
        let full_key = self.full_key(key);
        self.backend
            .get(&full_key)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| Error::Decode {
                    key: full_key.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// Encodes and writes `value` under `key`
    ///
    /// # Errors
    ///
    /// Returns an error when encoding or the backend fails.
    pub fn try_save<T: Serialize + ?Sized>(&mut self, key: Key, value: &T) -> Result<(), Error> {
        let full_key = self.full_key(key);
        let raw = serde_json::to_string(value).map_err(|source| Error::Encode {
            key: full_key.clone(),
            source,
        })?;
        self.backend.set(&full_key, raw)?;
        self.written.insert(full_key);
        Ok(())
    }

    /// Best-effort read; failures are logged and read as absent
    pub fn load<T: DeserializeOwned>(&self, key: Key) -> Option<T> {
        self.try_load(key)
            .inspect_err(|error| warn!(%key, %error, "session storage read failed"))
            .ok()
            .flatten()
    }

    /// Best-effort write; failures are logged and otherwise ignored
    pub fn save<T: Serialize + ?Sized>(&mut self, key: Key, value: &T) {
        if let Err(error) = self.try_save(key, value) {
            warn!(%key, %error, "session storage write failed");
        }
    }

    /// Best-effort delete
    pub fn remove(&mut self, key: Key) {
        let full_key = self.full_key(key);
        if let Err(error) = self.backend.remove(&full_key) {
            warn!(%key, %error, "session storage delete failed");
        }
        self.written.remove(&full_key);
    }

    /// The persisted deadline of a phase, if it is still in the future
    pub fn load_deadline(&self, phase: Phase, index: usize, now: EpochMillis) -> Option<EpochMillis> {
        self.load::<EpochMillis>(Key::Deadline(phase, index))
            .filter(|deadline| *deadline > now)
    }

    /// Persists the deadline of a phase
    pub fn save_deadline(&mut self, phase: Phase, index: usize, deadline: EpochMillis) {
        self.save(Key::Deadline(phase, index), &deadline);
    }

    /// Forgets the deadline of a phase
    pub fn remove_deadline(&mut self, phase: Phase, index: usize) {
        self.remove(Key::Deadline(phase, index));
    }

    /// Removes every key under the namespace and every key written through
    /// this store
    pub fn clear(&mut self) {
        let prefix = format!("{}:", self.namespace);
        let mut doomed = std::mem::take(&mut self.written);
        match self.backend.keys() {
            Ok(keys) => doomed.extend(keys.into_iter().filter(|key| key.starts_with(&prefix))),
            Err(error) => warn!(%error, "session storage could not be listed"),
        }
        for key in doomed {
            if let Err(error) = self.backend.remove(&key) {
                warn!(%key, %error, "session storage delete failed");
            }
        }
    }
}
