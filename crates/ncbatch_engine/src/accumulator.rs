//! Grouped accumulation of pending configuration fragments.
//!
//! Fragments are keyed by the apply-group they belong to. Staging the same
//! group repeatedly appends to its entry in call order, so a change can be
//! built up one statement at a time and still reach the device as one group
//! body.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use ncbatch_protocol::envelope::{group_delete_fragment, read_wrapper, strip_configuration};
use ncbatch_protocol::{find_apply_group_name, Document};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::BatchResult;

/// One map from apply-group name to accumulated fragment text.
///
/// Every mutation happens under the write lock, so an append is atomic per
/// key and concurrent stagers never lose an update.
#[derive(Debug, Default)]
struct FragmentCache {
    entries: RwLock<HashMap<String, String>>,
}

impl FragmentCache {
    fn append(&self, group: String, fragment: &str) {
        self.entries
            .write()
            .entry(group)
            .or_default()
            .push_str(fragment);
    }

    fn get(&self, group: &str) -> Option<String> {
        self.entries
            .read()
            .get(group)
            .filter(|fragment| !fragment.is_empty())
            .cloned()
    }

    /// Concatenates every entry. Group order is unspecified.
    fn concat(&self) -> String {
        self.entries.read().values().map(String::as_str).collect()
    }

    fn groups(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }

    /// Removes committed fragments. Entries only ever grow by appending, so
    /// whatever follows the committed prefix was staged after the snapshot
    /// and stays pending.
    fn remove_committed(&self, committed: &HashMap<String, String>) {
        let mut entries = self.entries.write();
        for (group, fragment) in committed {
            let rest = entries
                .get(group)
                .and_then(|entry| entry.strip_prefix(fragment.as_str()))
                .map(str::to_owned);
            match rest {
                Some(rest) if rest.is_empty() => {
                    entries.remove(group);
                }
                Some(rest) => {
                    entries.insert(group.clone(), rest);
                }
                None => {}
            }
        }
    }

    fn replace(&self, group: String, fragment: String) {
        self.entries.write().insert(group, fragment);
    }

    fn remove(&self, group: &str) {
        self.entries.write().remove(group);
    }
}

/// The write, read and delete components of one group, unmerged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGroup {
    /// Staged, uncommitted write fragments.
    pub write: String,
    /// Fragment cached from the device.
    pub read: String,
    /// Staged delete directives.
    pub delete: String,
}

impl RawGroup {
    /// Returns true if no cache holds anything for the group.
    pub fn is_empty(&self) -> bool {
        self.write.is_empty() && self.read.is_empty() && self.delete.is_empty()
    }
}

/// Snapshot of the staged writes and deletes taken when a commit starts.
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
    writes: HashMap<String, String>,
    deletes: HashMap<String, String>,
}

impl PendingBatch {
    /// Concatenated write fragments. Group order is unspecified.
    pub fn write_payload(&self) -> String {
        self.writes.values().map(String::as_str).collect()
    }

    /// Concatenated delete directives. Group order is unspecified.
    pub fn delete_payload(&self) -> String {
        self.deletes.values().map(String::as_str).collect()
    }

    /// Groups with staged deletes.
    pub fn deleted_groups(&self) -> impl Iterator<Item = &str> {
        self.deletes.keys().map(String::as_str)
    }

    /// Returns true if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }
}

/// Concurrency-safe store of pending reads, writes and deletes keyed by
/// apply-group name.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    reads: FragmentCache,
    writes: FragmentCache,
    deletes: FragmentCache,
    hydrated: AtomicBool,
}

impl GroupAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches every group definition found in a full device document and
    /// marks the read cache as hydrated.
    pub fn stage_read(&self, device_document: &str) -> BatchResult<()> {
        let definitions = Document::parse(device_document)?.group_definitions();
        debug!(groups = definitions.len(), "caching device group listing");
        for definition in definitions {
            self.reads.append(definition.name, &definition.fragment);
        }
        self.hydrated.store(true, Ordering::Release);
        Ok(())
    }

    /// Stages a configuration fragment under the group its `apply-groups`
    /// element names. The `<configuration>` wrapper is stripped so staged
    /// fragments can share one load envelope.
    pub fn stage_write(&self, fragment: &str) -> BatchResult<()> {
        let (group, payload) = prepare_write(fragment)?;
        debug!(%group, bytes = payload.len(), "staging write");
        self.writes.append(group, &payload);
        Ok(())
    }

    /// Stages removal of a group definition and its apply-groups reference.
    pub fn stage_delete(&self, group: &str) -> BatchResult<()> {
        let (group, payload) = prepare_delete(group)?;
        debug!(%group, "staging delete");
        self.deletes.append(group, &payload);
        Ok(())
    }

    /// Stages a delete of `group` and a write of `fragment` together. Both
    /// are validated before either cache changes.
    pub fn stage_replace(&self, group: &str, fragment: &str) -> BatchResult<()> {
        let (deleted, delete_payload) = prepare_delete(group)?;
        let (written, write_payload) = prepare_write(fragment)?;
        debug!(%deleted, %written, "staging replace");
        self.deletes.append(deleted, &delete_payload);
        self.writes.append(written, &write_payload);
        Ok(())
    }

    /// Returns the group as a configuration document.
    ///
    /// Staged writes take precedence over the device copy. An unknown group
    /// yields an empty string.
    pub fn read_group(&self, group: &str) -> String {
        self.writes
            .get(group)
            .or_else(|| self.reads.get(group))
            .map(|fragment| read_wrapper(&fragment))
            .unwrap_or_default()
    }

    /// Returns each cache's entry for the group without merging.
    pub fn read_group_raw(&self, group: &str) -> RawGroup {
        RawGroup {
            write: self.writes.get(group).unwrap_or_default(),
            read: self.reads.get(group).unwrap_or_default(),
            delete: self.deletes.get(group).unwrap_or_default(),
        }
    }

    /// Concatenation of every staged write.
    pub fn read_all_writes(&self) -> String {
        self.writes.concat()
    }

    /// Concatenation of every staged delete.
    pub fn read_all_deletes(&self) -> String {
        self.deletes.concat()
    }

    /// Concatenation of every cached device group.
    pub fn read_all_reads(&self) -> String {
        self.reads.concat()
    }

    /// Returns true once the read cache was populated from the device.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    /// Names present in any cache, sorted.
    pub fn groups(&self) -> BTreeSet<String> {
        let mut groups = BTreeSet::new();
        for cache in [&self.reads, &self.writes, &self.deletes] {
            groups.extend(cache.groups());
        }
        groups
    }

    /// Names with staged writes or deletes, sorted.
    pub fn pending_groups(&self) -> BTreeSet<String> {
        let mut groups: BTreeSet<_> = self.writes.groups().into_iter().collect();
        groups.extend(self.deletes.groups());
        groups
    }

    /// Number of groups cached from the device.
    pub fn cached_group_count(&self) -> usize {
        self.reads.len()
    }

    /// Returns true if anything is staged for the next commit.
    pub fn has_pending(&self) -> bool {
        !self.writes.is_empty() || !self.deletes.is_empty()
    }

    /// Copies the staged writes and deletes for a commit. The caches keep
    /// them, so reads during the commit still see the uncommitted edits.
    pub fn pending_batch(&self) -> PendingBatch {
        PendingBatch {
            deletes: self.deletes.snapshot(),
            writes: self.writes.snapshot(),
        }
    }

    /// Clears a committed batch from the pending caches and folds it into
    /// the read cache.
    ///
    /// Fragments staged after the batch was taken stay pending. Deleted
    /// groups leave the read cache and written groups replace their entry;
    /// before hydration the read cache is left alone, since the first
    /// hydration fetches the committed state from the device.
    pub fn settle_committed(&self, batch: &PendingBatch) {
        self.deletes.remove_committed(&batch.deletes);
        self.writes.remove_committed(&batch.writes);
        if !self.is_hydrated() {
            return;
        }
        for group in batch.deleted_groups() {
            self.reads.remove(group);
        }
        for (group, fragment) in &batch.writes {
            self.reads.replace(group.clone(), fragment.clone());
        }
    }
}

fn prepare_write(fragment: &str) -> BatchResult<(String, String)> {
    let group = find_apply_group_name(fragment)?;
    Ok((group, strip_configuration(fragment)))
}

/// The group name is read back from the synthesized directives so deletes
/// are keyed exactly like writes.
fn prepare_delete(group: &str) -> BatchResult<(String, String)> {
    let payload = group_delete_fragment(group);
    let group = find_apply_group_name(&payload)?;
    Ok((group, payload))
}
