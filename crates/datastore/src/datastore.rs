//! The DataStore: owner of every Buffer, View and Group
//!
//! All entities live in arenas inside the DataStore and refer to each other
//! by handle. Callers reach them through borrowing accessors
//! (`view`/`view_mut`, `group`/`group_mut`, `buffer`/`buffer_mut`), so the
//! usual aliasing rules cover the whole tree: one writer or many readers.

use std::collections::BTreeSet;
use std::sync::Arc;

use meshstore_core::{join_path, split_path, EntityKind, Error, IndexType, Result, TypeId};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::arena::{dangling, Arena, GroupId, ViewId};
use crate::buffer::Buffer;
use crate::diagnostics::Diagnostic;
use crate::group::{Group, GroupMut, GroupRef};
use crate::view::{View, ViewMut, ViewRef};

/// A DataStore shared between threads
///
/// Writers take the lock exclusively; concurrent readers share it.
pub type SharedDataStore = Arc<RwLock<DataStore>>;

/// Owner of a Group tree and the Buffers its Views use
#[derive(Debug)]
pub struct DataStore {
    pub(crate) views: Arena<View, ViewId>,
    pub(crate) groups: Arena<Group, GroupId>,
    buffers: Vec<Option<Buffer>>,
    free_buffers: BTreeSet<usize>,
    root: GroupId,
    diagnostics: Vec<Diagnostic>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// Create an empty DataStore with just a root Group
    pub fn new() -> Self {
        let mut groups = Arena::new();
        let root = groups.insert(Group::new(String::new(), None));
        debug!(target: "meshstore::datastore", "created datastore");
        DataStore {
            views: Arena::new(),
            groups,
            buffers: Vec::new(),
            free_buffers: BTreeSet::new(),
            root,
            diagnostics: Vec::new(),
        }
    }

    /// Wrap in an `Arc<RwLock<_>>` for sharing across threads
    pub fn into_shared(self) -> SharedDataStore {
        Arc::new(RwLock::new(self))
    }

    // ---------------------------------------------------------------
    // groups and views
    // ---------------------------------------------------------------

    /// Handle of the root Group
    pub fn root_id(&self) -> GroupId {
        self.root
    }

    /// The root Group
    pub fn root(&self) -> GroupRef<'_> {
        self.group(self.root).unwrap_or_else(|| dangling(self.root))
    }

    /// The root Group, mutably
    pub fn root_mut(&mut self) -> GroupMut<'_> {
        GroupMut {
            id: self.root,
            store: self,
        }
    }

    /// Group by handle
    pub fn group(&self, id: GroupId) -> Option<GroupRef<'_>> {
        self.groups.get(id).map(|group| GroupRef {
            store: self,
            id,
            group,
        })
    }

    /// Group by handle, mutably
    pub fn group_mut(&mut self, id: GroupId) -> Option<GroupMut<'_>> {
        if !self.groups.contains(id) {
            return None;
        }
        Some(GroupMut { store: self, id })
    }

    /// View by handle
    pub fn view(&self, id: ViewId) -> Option<ViewRef<'_>> {
        self.views.get(id).map(|view| ViewRef {
            store: self,
            id,
            view,
        })
    }

    /// View by handle, mutably
    pub fn view_mut(&mut self, id: ViewId) -> Option<ViewMut<'_>> {
        if !self.views.contains(id) {
            return None;
        }
        Some(ViewMut { store: self, id })
    }

    /// Handle of the View at `path` below the root
    pub fn view_at_path(&self, path: &str) -> Option<ViewId> {
        self.resolve_view(self.root, path)
    }

    /// Handle of the Group at `path` below the root
    pub fn group_at_path(&self, path: &str) -> Option<GroupId> {
        self.resolve_group(self.root, path)
    }

    /// Number of live Views
    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Number of live Groups, including the root
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn resolve_group(&self, from: GroupId, path: &str) -> Option<GroupId> {
        let mut current = from;
        let mut rest = Some(path);
        while let Some((head, tail)) = rest.and_then(split_path) {
            current = self.groups.get(current)?.groups.get(head)?;
            rest = tail;
        }
        Some(current)
    }

    pub(crate) fn resolve_view(&self, from: GroupId, path: &str) -> Option<ViewId> {
        let path = path.trim_start_matches(meshstore_core::PATH_DELIMITER);
        let (parent, leaf) = match path.rsplit_once(meshstore_core::PATH_DELIMITER) {
            Some((parent, leaf)) => (self.resolve_group(from, parent)?, leaf),
            None => (from, path),
        };
        self.groups.get(parent)?.views.get(leaf)
    }

    /// Path of a Group from the root (empty for the root itself)
    pub(crate) fn group_path(&self, id: GroupId) -> String {
        let mut names = Vec::new();
        let mut current = self.groups.get(id);
        while let Some(group) = current {
            let Some(parent) = group.parent else {
                break;
            };
            names.push(group.name.as_str());
            current = self.groups.get(parent);
        }
        names.reverse();
        names.join("/")
    }

    /// Full path of a View
    pub(crate) fn view_path(&self, id: ViewId) -> String {
        match self.views.get(id) {
            Some(view) => join_path(&self.group_path(view.owner), &view.name),
            None => String::new(),
        }
    }

    pub(crate) fn insert_view(&mut self, group: GroupId, name: &str) -> ViewId {
        let id = self.views.insert(View::new(name.to_string(), group));
        if let Some(parent) = self.groups.get_mut(group) {
            parent.views.insert(name, id);
        }
        id
    }

    pub(crate) fn insert_group(&mut self, parent: GroupId, name: &str) -> GroupId {
        let id = self
            .groups
            .insert(Group::new(name.to_string(), Some(parent)));
        if let Some(group) = self.groups.get_mut(parent) {
            group.groups.insert(name, id);
        }
        id
    }

    /// Remove a View, detaching it from its Buffer
    ///
    /// With `with_data`, a Buffer left without Views is destroyed too.
    pub(crate) fn destroy_view_entry(&mut self, id: ViewId, with_data: bool) {
        let Some(view) = self.views.remove(id) else {
            return;
        };
        if let Some(group) = self.groups.get_mut(view.owner) {
            group.views.remove(&view.name);
        }
        if let Some(index) = view.buffer_index() {
            let orphaned = match self.buffer_mut(index) {
                Some(buffer) => {
                    buffer.detach(id);
                    buffer.num_views() == 0
                }
                None => false,
            };
            if with_data && orphaned {
                self.remove_buffer(index);
            }
        }
    }

    /// Remove a Group and everything below it
    pub(crate) fn destroy_group_entry(&mut self, id: GroupId) {
        let Some(group) = self.groups.get(id) else {
            return;
        };
        let views: Vec<ViewId> = group.views.ids().collect();
        let children: Vec<GroupId> = group.groups.ids().collect();
        for view in views {
            self.destroy_view_entry(view, false);
        }
        for child in children {
            self.destroy_group_entry(child);
        }
        if let Some(group) = self.groups.remove(id) {
            if let Some(parent) = group.parent.and_then(|p| self.groups.get_mut(p)) {
                parent.groups.remove(&group.name);
            }
        }
    }

    // ---------------------------------------------------------------
    // buffers
    // ---------------------------------------------------------------

    /// Create an undescribed, unallocated Buffer
    ///
    /// Takes the smallest index freed by an earlier `destroy_buffer`, or the
    /// next new one.
    pub fn create_buffer(&mut self) -> usize {
        let index = match self.free_buffers.pop_first() {
            Some(index) => index,
            None => {
                self.buffers.push(None);
                self.buffers.len() - 1
            }
        };
        self.buffers[index] = Some(Buffer::new(index));
        debug!(target: "meshstore::datastore", buffer = index, "created buffer");
        index
    }

    /// Create a Buffer and allocate `num_elements` of `dtype`
    pub fn create_buffer_typed(&mut self, dtype: TypeId, num_elements: IndexType) -> Result<usize> {
        let index = self.create_buffer();
        let allocated = self
            .buffer_mut(index)
            .map_or(Ok(()), |b| b.allocate(dtype, num_elements));
        if let Err(err) = allocated {
            self.remove_buffer(index);
            return Err(err);
        }
        Ok(index)
    }

    /// Destroy a Buffer
    ///
    /// Refused with `BufferInUse` while any View is attached.
    pub fn destroy_buffer(&mut self, index: usize) -> Result<()> {
        let buffer = self.buffer(index).ok_or_else(|| Error::NotFound {
            kind: EntityKind::Buffer,
            name: index.to_string(),
        })?;
        if buffer.num_views() > 0 {
            let err = Error::BufferInUse {
                buffer: index,
                views: buffer.num_views(),
            };
            tracing::warn!(
                target: "meshstore::datastore",
                buffer = index,
                error = %err,
                "buffer destroy rejected"
            );
            self.record(Diagnostic::new(
                format!("buffer {}", index),
                "destroy_buffer",
                None,
                &err,
            ));
            return Err(err);
        }
        self.remove_buffer(index);
        Ok(())
    }

    /// Destroy every Buffer no View is attached to; returns how many went
    pub fn destroy_unused_buffers(&mut self) -> usize {
        let unused: Vec<usize> = self
            .buffers()
            .filter(|b| b.num_views() == 0)
            .map(Buffer::index)
            .collect();
        for &index in &unused {
            self.remove_buffer(index);
        }
        unused.len()
    }

    pub(crate) fn remove_buffer(&mut self, index: usize) {
        if let Some(slot) = self.buffers.get_mut(index) {
            if slot.take().is_some() {
                self.free_buffers.insert(index);
                debug!(target: "meshstore::datastore", buffer = index, "destroyed buffer");
            }
        }
    }

    /// Buffer by index
    pub fn buffer(&self, index: usize) -> Option<&Buffer> {
        self.buffers.get(index).and_then(Option::as_ref)
    }

    /// Buffer by index, mutably
    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut Buffer> {
        self.buffers.get_mut(index).and_then(Option::as_mut)
    }

    /// True if a Buffer exists at `index`
    pub fn has_buffer(&self, index: usize) -> bool {
        self.buffer(index).is_some()
    }

    /// Number of live Buffers
    pub fn num_buffers(&self) -> usize {
        self.buffers.len() - self.free_buffers.len()
    }

    /// Live Buffers in index order
    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> + '_ {
        self.buffers.iter().filter_map(Option::as_ref)
    }

    // ---------------------------------------------------------------
    // diagnostics
    // ---------------------------------------------------------------

    pub(crate) fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Rejected operations recorded so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the recorded diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Log a one-line summary of the store's contents
    pub fn log_summary(&self) {
        info!(
            target: "meshstore::datastore",
            groups = self.num_groups(),
            views = self.num_views(),
            buffers = self.num_buffers(),
            diagnostics = self.diagnostics.len(),
            "datastore summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_root() {
        let ds = DataStore::new();
        assert_eq!(ds.num_groups(), 1);
        assert_eq!(ds.num_views(), 0);
        assert_eq!(ds.num_buffers(), 0);
        assert_eq!(ds.root().name(), "");
        assert!(ds.root().parent().is_none());
    }

    #[test]
    fn test_buffer_index_reuse() {
        let mut ds = DataStore::new();
        let b0 = ds.create_buffer();
        let b1 = ds.create_buffer();
        assert_eq!((b0, b1), (0, 1));
        ds.destroy_buffer(b0).unwrap();
        assert_eq!(ds.num_buffers(), 1);
        assert_eq!(ds.create_buffer(), 0);
        assert_eq!(ds.create_buffer(), 2);
    }

    #[test]
    fn test_buffer_index_reuse_picks_smallest() {
        let mut ds = DataStore::new();
        for _ in 0..5 {
            ds.create_buffer();
        }
        ds.destroy_buffer(3).unwrap();
        ds.destroy_buffer(1).unwrap();
        assert_eq!(ds.create_buffer(), 1);
        assert_eq!(ds.create_buffer(), 3);
        assert_eq!(ds.create_buffer(), 5);
    }

    #[test]
    fn test_destroy_buffer_with_views_fails() {
        let mut ds = DataStore::new();
        let id = ds
            .root_mut()
            .create_view_and_allocate("v", TypeId::Int32, 2)
            .unwrap();
        let index = ds.view(id).unwrap().buffer_index().unwrap();
        let err = ds.destroy_buffer(index).unwrap_err();
        assert!(matches!(err, Error::BufferInUse { views: 1, .. }));
        assert!(ds.buffer(index).is_some());
        assert!(ds.view(id).unwrap().is_applied());
        assert_eq!(ds.diagnostics().len(), 1);
    }

    #[test]
    fn test_destroy_missing_buffer() {
        let mut ds = DataStore::new();
        assert!(matches!(
            ds.destroy_buffer(4),
            Err(Error::NotFound {
                kind: EntityKind::Buffer,
                ..
            })
        ));
    }

    #[test]
    fn test_create_buffer_typed_failure_releases_index() {
        let mut ds = DataStore::new();
        assert!(ds.create_buffer_typed(TypeId::NoType, 3).is_err());
        assert_eq!(ds.num_buffers(), 0);
        assert_eq!(ds.create_buffer(), 0);
    }

    #[test]
    fn test_destroy_unused_buffers() {
        let mut ds = DataStore::new();
        ds.create_buffer();
        ds.root_mut()
            .create_view_and_allocate("v", TypeId::Int8, 1)
            .unwrap();
        ds.create_buffer();
        assert_eq!(ds.destroy_unused_buffers(), 2);
        assert_eq!(ds.num_buffers(), 1);
    }

    #[test]
    fn test_path_lookup() {
        let mut ds = DataStore::new();
        let v = ds
            .root_mut()
            .create_view_scalar("a/b/c", 1.0f64)
            .unwrap();
        assert_eq!(ds.view_at_path("a/b/c"), Some(v));
        assert_eq!(ds.view_at_path("/a/b/c"), Some(v));
        assert_eq!(ds.view_at_path("a/b"), None);
        assert!(ds.group_at_path("a/b").is_some());
        assert_eq!(ds.group_at_path(""), Some(ds.root_id()));
        assert_eq!(ds.group_at_path("a/x"), None);
    }

    #[test]
    fn test_stale_view_handle() {
        let mut ds = DataStore::new();
        let v = ds.root_mut().create_view("v").unwrap();
        ds.root_mut().destroy_view("v").unwrap();
        let w = ds.root_mut().create_view("w").unwrap();
        assert!(ds.view(v).is_none());
        assert!(ds.view_mut(v).is_none());
        assert_eq!(ds.view(w).unwrap().name(), "w");
    }

    #[test]
    fn test_take_diagnostics_drains() {
        let mut ds = DataStore::new();
        let v = ds.root_mut().create_view("v").unwrap();
        ds.view_mut(v).unwrap().apply();
        assert_eq!(ds.take_diagnostics().len(), 1);
        assert!(ds.diagnostics().is_empty());
    }

    #[test]
    fn test_shared_store_readers() {
        let mut ds = DataStore::new();
        ds.root_mut()
            .create_view_and_allocate("v", TypeId::Float64, 16)
            .unwrap();
        let shared = ds.into_shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    let ds = shared.read();
                    let id = ds.view_at_path("v").unwrap();
                    ds.view(id).unwrap().data::<f64>().unwrap().len()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 16);
        }
    }
}
