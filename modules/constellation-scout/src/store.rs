use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::error::StoreError;
use crate::fsio::write_atomic;
use crate::types::{Profile, UpsertPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Unchanged,
    Refreshed,
}

/// Handle-keyed profiles in first-seen order.
///
/// The dataset file is the only durable state: loading it rebuilds both the
/// collection and the processed set.
#[derive(Debug, Default)]
pub struct CollectionStore {
    profiles: Vec<Profile>,
    index: HashMap<String, usize>,
    policy: UpsertPolicy,
}

impl CollectionStore {
    pub fn new(policy: UpsertPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Load a dataset written by [`checkpoint`](Self::checkpoint). A missing
    /// file is a first run and yields an empty store.
    pub fn load(path: &Path, policy: UpsertPolicy) -> Result<Self, StoreError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No dataset yet, starting fresh");
                return Ok(Self::new(policy));
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let profiles: Vec<Profile> =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        let mut store = Self::new(policy);
        let mut duplicates = 0;
        for profile in profiles {
            // A hand-edited file may repeat a handle; the first entry wins.
            if store.index.contains_key(&profile.handle) {
                duplicates += 1;
                continue;
            }
            store.push(profile);
        }

        info!(
            path = %path.display(),
            profiles = store.len(),
            duplicates,
            "Resumed dataset"
        );
        Ok(store)
    }

    pub fn policy(&self) -> UpsertPolicy {
        self.policy
    }

    pub fn has(&self, handle: &str) -> bool {
        self.index.contains_key(handle)
    }

    pub fn get(&self, handle: &str) -> Option<&Profile> {
        self.index.get(handle).map(|&i| &self.profiles[i])
    }

    pub fn upsert(&mut self, profile: Profile) -> UpsertOutcome {
        match self.index.get(&profile.handle) {
            None => {
                self.push(profile);
                UpsertOutcome::Inserted
            }
            Some(_) if self.policy == UpsertPolicy::KeepFirst => {
                debug!(handle = profile.handle.as_str(), "Already collected, skipping");
                UpsertOutcome::Unchanged
            }
            Some(&i) => {
                if self.profiles[i] == profile {
                    return UpsertOutcome::Unchanged;
                }
                self.profiles[i] = profile;
                UpsertOutcome::Refreshed
            }
        }
    }

    /// Write the full collection as a pretty-printed JSON array.
    pub fn checkpoint(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.profiles)?;
        write_atomic(path, &json).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), profiles = self.len(), "Checkpoint written");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn processed_handles(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    fn push(&mut self, profile: Profile) {
        self.index.insert(profile.handle.clone(), self.profiles.len());
        self.profiles.push(profile);
    }
}
