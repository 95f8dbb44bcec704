use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardTreeError {
    #[error("shard not found in tree")]
    ShardNotFound,
    #[error("conflicting shard already exists in tree")]
    ShardConflict,
    #[error("ancestor in progress")]
    AncestorInProgress,
    #[error("ancestor incomplete")]
    AncestorIncomplete,
}

/// One contiguous partition of a change stream. Parent links are kept as ids
/// and resolved through the tree's map, never as owned references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    id: String,
    parent_id: Option<String>,
}

impl Shard {
    pub fn new<T: Into<String>>(id: &str, parent: Option<T>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent.map(|p| p.into()),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

#[derive(Debug)]
struct ShardStatus {
    shard: Shard,
    in_progress: bool,
    complete: bool,
}

impl ShardStatus {
    fn new(shard: Shard) -> Self {
        Self {
            shard,
            in_progress: false,
            complete: false,
        }
    }
}

/// Tracks parent/child dependencies among stream shards and hands out shards
/// that are safe to consume. A shard's children become available only once
/// the shard itself completes, which preserves per-key mutation order while
/// independent lineages drain in parallel.
#[derive(Debug, Default)]
pub struct ShardTree {
    // The status of every known shard, by id.
    statuses: HashMap<String, ShardStatus>,

    // The most descendent shards (shards that are nobody's parent).
    leaf_ids: HashSet<String>,
}

impl ShardTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert newly discovered shards. Re-adding a known id with the same
    /// parent is a no-op; a different parent is a conflict.
    pub fn add(&mut self, shards: Vec<Shard>) -> Result<(), ShardTreeError> {
        for shard in shards {
            match self.statuses.get(shard.id()) {
                Some(existing) => {
                    if existing.shard.parent_id() != shard.parent_id() {
                        return Err(ShardTreeError::ShardConflict);
                    }
                }
                None => {
                    self.leaf_ids.insert(shard.id().to_owned());
                    self.statuses
                        .insert(shard.id().to_owned(), ShardStatus::new(shard));
                }
            }
        }

        // Any shard that is some other shard's parent is no longer a leaf.
        let parent_ids: Vec<String> = self
            .statuses
            .values()
            .filter_map(|status| status.shard.parent_id().map(str::to_owned))
            .collect();
        for parent_id in parent_ids {
            self.leaf_ids.remove(&parent_id);
        }

        Ok(())
    }

    /// Mark a shard fully consumed. Legal only for a known shard whose parent
    /// (when tracked) has already completed.
    pub fn shard_complete(&mut self, shard: &Shard) -> Result<(), ShardTreeError> {
        if !self.statuses.contains_key(shard.id()) {
            return Err(ShardTreeError::ShardNotFound);
        }

        if let Some(parent_id) = shard.parent_id() {
            if let Some(parent) = self.statuses.get(parent_id) {
                if !parent.complete {
                    return Err(ShardTreeError::AncestorIncomplete);
                }
            }
        }

        if let Some(status) = self.statuses.get_mut(shard.id()) {
            status.in_progress = false;
            status.complete = true;
        }
        Ok(())
    }

    /// Collect the shards that can be worked on right now: for each leaf
    /// lineage, the oldest ancestor that is neither complete nor in progress.
    /// Returned shards are marked in progress so a later call cannot hand
    /// them out again.
    pub fn available_shards(&mut self) -> Vec<Shard> {
        let mut available = Vec::new();

        let leaf_ids: Vec<String> = self.leaf_ids.iter().cloned().collect();
        for leaf_id in leaf_ids {
            let candidate = match self.available_ancestor(&leaf_id) {
                Ok(Some(id)) => id,
                // The leaf or its ancestors are not currently available.
                _ => continue,
            };

            if let Some(status) = self.statuses.get_mut(&candidate) {
                status.in_progress = true;
                available.push(status.shard.clone());
            }
        }

        available
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    fn available_ancestor(&self, id: &str) -> Result<Option<String>, ShardTreeError> {
        let status = self
            .statuses
            .get(id)
            .ok_or(ShardTreeError::ShardNotFound)?;

        // A complete shard implies its ancestors are also complete.
        if status.complete {
            return Ok(None);
        }

        // A lineage with any in-progress shard yields nothing new.
        if status.in_progress {
            return Err(ShardTreeError::AncestorInProgress);
        }

        // Prefer the oldest incomplete ancestor; the parent may legitimately
        // be unknown to the tree (trimmed before discovery).
        if let Some(parent_id) = status.shard.parent_id() {
            if self.statuses.contains_key(parent_id) {
                if let Some(ancestor) = self.available_ancestor(parent_id)? {
                    return Ok(Some(ancestor));
                }
            }
        }

        Ok(Some(id.to_owned()))
    }
}
