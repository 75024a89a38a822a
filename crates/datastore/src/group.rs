//! Groups: the hierarchical namespace of a DataStore
//!
//! A Group owns child Views and child Groups by name. One name is used at
//! most once per Group across both kinds. Children are kept in insertion
//! order, which is also the order they are exported in.
//!
//! Paths such as `"mesh/coords/x"` are accepted wherever a child is looked
//! up or created; creation makes any missing intermediate Groups.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use meshstore_core::{
    join_path, validate_name, Element, EntityKind, Error, IndexType, NameError, Result, TypeId,
    PATH_DELIMITER,
};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::arena::{dangling, GroupId, ViewId};
use crate::datastore::DataStore;
use crate::diagnostics::Diagnostic;
use crate::view::{View, ViewData, ViewMut, ViewRef};

/// Insertion-ordered name → handle map
#[derive(Debug, Clone)]
pub(crate) struct NameIndex<I: Copy> {
    lookup: FxHashMap<String, I>,
    order: Vec<String>,
}

impl<I: Copy> NameIndex<I> {
    fn new() -> Self {
        NameIndex {
            lookup: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<I> {
        self.lookup.get(name).copied()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: &str, id: I) {
        if self.lookup.insert(name.to_string(), id).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<I> {
        let id = self.lookup.remove(name)?;
        self.order.retain(|n| n != name);
        Some(id)
    }

    /// Rename in place, keeping the entry's position
    pub(crate) fn rename(&mut self, old: &str, new: &str) {
        if let Some(id) = self.lookup.remove(old) {
            self.lookup.insert(new.to_string(), id);
            if let Some(slot) = self.order.iter_mut().find(|n| n.as_str() == old) {
                *slot = new.to_string();
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.order.iter().filter_map(move |n| self.lookup.get(n).copied())
    }
}

/// A named node of the DataStore tree
#[derive(Debug)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) parent: Option<GroupId>,
    pub(crate) views: NameIndex<ViewId>,
    pub(crate) groups: NameIndex<GroupId>,
}

impl Group {
    pub(crate) fn new(name: String, parent: Option<GroupId>) -> Self {
        Group {
            name,
            parent,
            views: NameIndex::new(),
            groups: NameIndex::new(),
        }
    }

    /// Name of the Group (empty for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent Group, `None` for the root
    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Number of child Views
    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Number of child Groups
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Child View names in insertion order
    pub fn view_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.views.names()
    }

    /// Child Group names in insertion order
    pub fn group_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.names()
    }

    /// Child View handles in insertion order
    pub fn view_ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.ids()
    }

    /// Child Group handles in insertion order
    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.ids()
    }

    /// True if a direct child View or Group uses `name`
    pub fn has_child(&self, name: &str) -> bool {
        self.views.contains(name) || self.groups.contains(name)
    }
}

/// Split `"a/b/leaf"` into `(Some("a/b"), "leaf")`
fn split_leaf(path: &str) -> (Option<&str>, &str) {
    let path = path.trim_start_matches(PATH_DELIMITER);
    match path.rsplit_once(PATH_DELIMITER) {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    }
}

fn check_name(name: &str) -> Result<()> {
    validate_name(name).map_err(|reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Shared access to a Group together with its DataStore
#[derive(Clone, Copy)]
pub struct GroupRef<'a> {
    pub(crate) store: &'a DataStore,
    pub(crate) id: GroupId,
    pub(crate) group: &'a Group,
}

impl<'a> Deref for GroupRef<'a> {
    type Target = Group;

    fn deref(&self) -> &Group {
        self.group
    }
}

impl fmt::Debug for GroupRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRef")
            .field("id", &self.id)
            .field("path", &self.path_name())
            .field("views", &self.group.num_views())
            .field("groups", &self.group.num_groups())
            .finish()
    }
}

impl<'a> GroupRef<'a> {
    /// Handle of this Group
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Path from the root, including this Group's name (empty for the root)
    pub fn path_name(&self) -> String {
        self.store.group_path(self.id)
    }

    /// Path of the parent Group
    pub fn path(&self) -> String {
        self.group
            .parent
            .map(|p| self.store.group_path(p))
            .unwrap_or_default()
    }

    /// The parent Group
    pub fn parent_group(&self) -> Option<GroupRef<'a>> {
        self.group.parent.and_then(|p| self.store.group(p))
    }

    /// View at `path` relative to this Group
    pub fn view(&self, path: &str) -> Option<ViewRef<'a>> {
        let id = self.view_id(path)?;
        self.store.view(id)
    }

    /// Handle of the View at `path`
    pub fn view_id(&self, path: &str) -> Option<ViewId> {
        self.store.resolve_view(self.id, path)
    }

    /// Group at `path` relative to this Group
    pub fn group(&self, path: &str) -> Option<GroupRef<'a>> {
        let id = self.group_id(path)?;
        self.store.group(id)
    }

    /// Handle of the Group at `path`
    pub fn group_id(&self, path: &str) -> Option<GroupId> {
        self.store.resolve_group(self.id, path)
    }

    /// True if a View exists at `path`
    pub fn has_view(&self, path: &str) -> bool {
        self.view_id(path).is_some()
    }

    /// True if a Group exists at `path`
    pub fn has_group(&self, path: &str) -> bool {
        self.group_id(path).is_some()
    }

    /// Child Views in insertion order
    pub fn views(&self) -> impl Iterator<Item = ViewRef<'a>> + 'a {
        let store = self.store;
        self.group.views.ids().filter_map(move |id| store.view(id))
    }

    /// Child Groups in insertion order
    pub fn groups(&self) -> impl Iterator<Item = GroupRef<'a>> + 'a {
        let store = self.store;
        self.group.groups.ids().filter_map(move |id| store.group(id))
    }
}

/// Exclusive access to a Group for creating, moving and destroying children
pub struct GroupMut<'a> {
    pub(crate) store: &'a mut DataStore,
    pub(crate) id: GroupId,
}

impl fmt::Debug for GroupMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupMut")
            .field("id", &self.id)
            .field("path", &self.store.group_path(self.id))
            .finish()
    }
}

impl<'a> GroupMut<'a> {
    /// Handle of this Group
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Shared access to the same Group
    pub fn group(&self) -> GroupRef<'_> {
        GroupRef {
            store: &*self.store,
            id: self.id,
            group: self.entry(),
        }
    }

    /// Mutable access to a View at `path` below this Group
    pub fn view_mut(&mut self, path: &str) -> Option<ViewMut<'_>> {
        let id = self.store.resolve_view(self.id, path)?;
        self.store.view_mut(id)
    }

    /// Mutable access to a Group at `path` below this Group
    pub fn group_mut(&mut self, path: &str) -> Option<GroupMut<'_>> {
        let id = self.store.resolve_group(self.id, path)?;
        self.store.group_mut(id)
    }

    fn entry(&self) -> &Group {
        self.store
            .groups
            .get(self.id)
            .unwrap_or_else(|| dangling(self.id))
    }

    fn report<T>(&mut self, operation: &'static str, target: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            let base = self.store.group_path(self.id);
            let path = if target.is_empty() {
                base
            } else {
                join_path(&base, target)
            };
            warn!(
                target: "meshstore::group",
                path = %path,
                operation,
                error = %err,
                "group operation rejected"
            );
            self.store.record(Diagnostic::new(path, operation, None, err));
        }
        result
    }

    /// Resolve the Group a new child at `path` goes into, creating missing
    /// intermediate Groups, and check the leaf name is free there
    ///
    /// Also returns the topmost Group this call created, so a caller that
    /// fails later can take the new Groups back out.
    fn prepare_child<'p>(&mut self, path: &'p str) -> Result<(GroupId, &'p str, Option<GroupId>)> {
        let (parent, leaf) = split_leaf(path);
        check_name(leaf)?;
        let (gid, created) = match parent {
            None => (self.id, None),
            Some(parent) => match self.store.resolve_group(self.id, parent) {
                Some(gid) => (gid, None),
                None => self.create_group_path_inner(parent)?,
            },
        };
        let group = self.store.groups.get(gid).unwrap_or_else(|| dangling(gid));
        if group.has_child(leaf) {
            let err = Error::NameCollision {
                group: self.store.group_path(gid),
                name: leaf.to_string(),
            };
            self.discard_groups(created);
            return Err(err);
        }
        Ok((gid, leaf, created))
    }

    fn discard_groups(&mut self, created: Option<GroupId>) {
        if let Some(top) = created {
            self.store.destroy_group_entry(top);
        }
    }

    fn create_view_inner(&mut self, path: &str) -> Result<(ViewId, Option<GroupId>)> {
        let (gid, leaf, created) = self.prepare_child(path)?;
        let id = self.store.insert_view(gid, leaf);
        debug!(target: "meshstore::group", path = %self.store.view_path(id), "created view");
        Ok((id, created))
    }

    /// Create an EMPTY, undescribed View
    pub fn create_view(&mut self, path: &str) -> Result<ViewId> {
        let result = self.create_view_inner(path).map(|(id, _)| id);
        self.report("create_view", path, result)
    }

    /// Create a View described as `num_elements` of `dtype`
    pub fn create_view_typed(
        &mut self,
        path: &str,
        dtype: TypeId,
        num_elements: IndexType,
    ) -> Result<ViewId> {
        self.create_view_shape(path, dtype, &[num_elements])
    }

    /// Create a View described with a multi-dimensional shape
    pub fn create_view_shape(
        &mut self,
        path: &str,
        dtype: TypeId,
        shape: &[IndexType],
    ) -> Result<ViewId> {
        let result = self.create_then(path, |view| view.try_describe_shape(dtype, shape));
        self.report("create_view", path, result)
    }

    /// Create a View and allocate a fresh Buffer for it
    pub fn create_view_and_allocate(
        &mut self,
        path: &str,
        dtype: TypeId,
        num_elements: IndexType,
    ) -> Result<ViewId> {
        let result = self.create_then(path, |view| view.try_allocate_typed(dtype, num_elements));
        self.report("create_view_and_allocate", path, result)
    }

    /// Create a View over an existing Buffer
    ///
    /// The View is applied right away when the Buffer is allocated.
    pub fn create_view_with_buffer(
        &mut self,
        path: &str,
        dtype: TypeId,
        num_elements: IndexType,
        buffer: usize,
    ) -> Result<ViewId> {
        let result = self.create_then(path, |view| {
            view.try_describe(dtype, num_elements)?;
            view.try_attach_buffer(Some(buffer))
        });
        self.report("create_view_with_buffer", path, result)
    }

    /// Create an EXTERNAL View over caller memory
    ///
    /// # Safety
    ///
    /// `ptr` must satisfy the contract of
    /// [`ViewMut::try_set_external_data_ptr`] for the described layout.
    pub unsafe fn create_view_external(
        &mut self,
        path: &str,
        dtype: TypeId,
        num_elements: IndexType,
        ptr: NonNull<u8>,
    ) -> Result<ViewId> {
        let result = self.create_then(path, |view| {
            view.try_describe(dtype, num_elements)?;
            // SAFETY: forwarded from the caller.
            unsafe { view.try_set_external_data_ptr(Some(ptr)) }
        });
        self.report("create_view_external", path, result)
    }

    /// Create a SCALAR View
    pub fn create_view_scalar<T: Element>(&mut self, path: &str, value: T) -> Result<ViewId> {
        let result = self.create_then(path, |view| view.try_set_scalar(value));
        self.report("create_view_scalar", path, result)
    }

    /// Create a STRING View
    pub fn create_view_string(&mut self, path: &str, value: &str) -> Result<ViewId> {
        let result = self.create_then(path, |view| view.try_set_string(value));
        self.report("create_view_string", path, result)
    }

    /// Create a View and run `init` on it; the View and any Groups created
    /// for its path are removed again if `init` fails
    fn create_then<F>(&mut self, path: &str, init: F) -> Result<ViewId>
    where
        F: FnOnce(&mut ViewMut<'_>) -> Result<()>,
    {
        let (id, created) = self.create_view_inner(path)?;
        let mut view = ViewMut {
            store: &mut *self.store,
            id,
        };
        if let Err(err) = init(&mut view) {
            self.store.destroy_view_entry(id, true);
            self.discard_groups(created);
            return Err(err);
        }
        Ok(id)
    }

    fn destroy_view_inner(&mut self, path: &str, with_data: bool) -> Result<()> {
        let id = self
            .store
            .resolve_view(self.id, path)
            .ok_or_else(|| Error::NotFound {
                kind: EntityKind::View,
                name: path.to_string(),
            })?;
        self.store.destroy_view_entry(id, with_data);
        debug!(target: "meshstore::group", path, with_data, "destroyed view");
        Ok(())
    }

    /// Destroy the View at `path`; its Buffer is only detached
    pub fn destroy_view(&mut self, path: &str) -> Result<()> {
        let result = self.destroy_view_inner(path, false);
        self.report("destroy_view", path, result)
    }

    /// Destroy the View at `path` and its Buffer if no other View uses it
    pub fn destroy_view_and_data(&mut self, path: &str) -> Result<()> {
        let result = self.destroy_view_inner(path, true);
        self.report("destroy_view_and_data", path, result)
    }

    /// Walk `path`, creating missing Groups; on failure the Groups created
    /// so far are destroyed again
    fn create_group_path_inner(&mut self, path: &str) -> Result<(GroupId, Option<GroupId>)> {
        let mut created = None;
        match self.walk_group_path(path, &mut created) {
            Ok(gid) => Ok((gid, created)),
            Err(err) => {
                self.discard_groups(created);
                Err(err)
            }
        }
    }

    fn walk_group_path(&mut self, path: &str, created: &mut Option<GroupId>) -> Result<GroupId> {
        let mut gid = self.id;
        for segment in path
            .split(PATH_DELIMITER)
            .filter(|segment| !segment.is_empty())
        {
            check_name(segment)?;
            let group = self.store.groups.get(gid).unwrap_or_else(|| dangling(gid));
            if let Some(child) = group.groups.get(segment) {
                gid = child;
                continue;
            }
            if group.views.contains(segment) {
                return Err(Error::NameCollision {
                    group: self.store.group_path(gid),
                    name: segment.to_string(),
                });
            }
            gid = self.store.insert_group(gid, segment);
            created.get_or_insert(gid);
        }
        Ok(gid)
    }

    /// Create a child Group named `name`
    pub fn create_group(&mut self, name: &str) -> Result<GroupId> {
        let result = (|| {
            check_name(name)?;
            if self.entry().has_child(name) {
                return Err(Error::NameCollision {
                    group: self.store.group_path(self.id),
                    name: name.to_string(),
                });
            }
            let id = self.store.insert_group(self.id, name);
            debug!(target: "meshstore::group", path = %self.store.group_path(id), "created group");
            Ok(id)
        })();
        self.report("create_group", name, result)
    }

    /// Return the Group at `path`, creating every missing Group on the way
    pub fn create_group_path(&mut self, path: &str) -> Result<GroupId> {
        let result = self.create_group_path_inner(path).map(|(gid, _)| gid);
        self.report("create_group_path", path, result)
    }

    /// Destroy the Group at `path` with everything below it
    ///
    /// Views are detached from their Buffers; the Buffers themselves stay
    /// in the DataStore. A path naming no child (`""`, `"/"`) is rejected,
    /// as this Group cannot destroy itself.
    pub fn destroy_group(&mut self, path: &str) -> Result<()> {
        let result = match self.store.resolve_group(self.id, path) {
            Some(gid) if gid == self.id || gid == self.store.root_id() => Err(Error::InvalidName {
                name: path.to_string(),
                reason: NameError::Empty,
            }),
            Some(gid) => {
                self.store.destroy_group_entry(gid);
                debug!(target: "meshstore::group", path, "destroyed group");
                Ok(())
            }
            None => Err(Error::NotFound {
                kind: EntityKind::Group,
                name: path.to_string(),
            }),
        };
        self.report("destroy_group", path, result)
    }

    fn check_destination(&self, dest: GroupId, name: &str) -> Result<()> {
        let group = self.store.groups.get(dest).ok_or_else(|| Error::NotFound {
            kind: EntityKind::Group,
            name: format!("{:?}", dest),
        })?;
        if group.has_child(name) {
            return Err(Error::NameCollision {
                group: self.store.group_path(dest),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn find_view(&self, path: &str) -> Result<ViewId> {
        self.store
            .resolve_view(self.id, path)
            .ok_or_else(|| Error::NotFound {
                kind: EntityKind::View,
                name: path.to_string(),
            })
    }

    fn move_view_inner(&mut self, path: &str, dest: GroupId) -> Result<ViewId> {
        let id = self.find_view(path)?;
        let (owner, name) = {
            let view = self.store.views.get(id).unwrap_or_else(|| dangling(id));
            (view.owner, view.name.clone())
        };
        if owner == dest {
            return Ok(id);
        }
        self.check_destination(dest, &name)?;
        if let Some(group) = self.store.groups.get_mut(owner) {
            group.views.remove(&name);
        }
        if let Some(group) = self.store.groups.get_mut(dest) {
            group.views.insert(&name, id);
        }
        if let Some(view) = self.store.views.get_mut(id) {
            view.owner = dest;
        }
        debug!(target: "meshstore::group", from = %path, to = %self.store.view_path(id), "moved view");
        Ok(id)
    }

    /// Move the View at `path` into `dest`, keeping its name
    pub fn move_view(&mut self, path: &str, dest: GroupId) -> Result<ViewId> {
        let result = self.move_view_inner(path, dest);
        self.report("move_view", path, result)
    }

    fn copy_view_inner(&mut self, path: &str, dest: GroupId) -> Result<ViewId> {
        let id = self.find_view(path)?;
        let source = self.store.views.get(id).unwrap_or_else(|| dangling(id));
        let name = source.name.clone();
        self.check_destination(dest, &name)?;

        let mut copy = View::new(name.clone(), dest);
        copy.schema = source.schema;
        copy.shape = source.shape.clone();
        copy.data = source.data.clone();
        copy.applied = match &source.data {
            ViewData::Empty => false,
            ViewData::Scalar(_) | ViewData::String(_) => true,
            ViewData::External(_) => source.schema.is_some(),
            ViewData::Buffer(index) => match (source.schema, self.store.buffer(*index)) {
                (Some(schema), Some(buffer)) => {
                    buffer.is_allocated() && schema.spanned_bytes() <= buffer.allocated_bytes()
                }
                _ => false,
            },
        };
        let buffer = copy.buffer_index();

        let new_id = self.store.views.insert(copy);
        if let Some(group) = self.store.groups.get_mut(dest) {
            group.views.insert(&name, new_id);
        }
        if let Some(index) = buffer {
            if let Some(buffer) = self.store.buffer_mut(index) {
                buffer.attach(new_id);
            }
        }
        Ok(new_id)
    }

    /// Shallow copy of the View at `path` into `dest`
    ///
    /// The copy shares the original's Buffer, external pointer or inline
    /// value and has the same description.
    pub fn copy_view(&mut self, path: &str, dest: GroupId) -> Result<ViewId> {
        let result = self.copy_view_inner(path, dest);
        self.report("copy_view", path, result)
    }

    /// Rename this Group within its parent
    pub fn try_rename(&mut self, new_name: &str) -> Result<()> {
        let (parent, old) = {
            let group = self.entry();
            (group.parent, group.name.clone())
        };
        if parent.is_none() {
            return Err(Error::InvalidName {
                name: new_name.to_string(),
                reason: NameError::Root,
            });
        }
        if old == new_name {
            return Ok(());
        }
        check_name(new_name)?;
        if let Some(parent) = parent {
            let siblings = self.store.groups.get(parent).unwrap_or_else(|| dangling(parent));
            if siblings.has_child(new_name) {
                return Err(Error::NameCollision {
                    group: self.store.group_path(parent),
                    name: new_name.to_string(),
                });
            }
            if let Some(siblings) = self.store.groups.get_mut(parent) {
                siblings.groups.rename(&old, new_name);
            }
        }
        if let Some(group) = self.store.groups.get_mut(self.id) {
            group.name = new_name.to_string();
        }
        Ok(())
    }

    /// Rename this Group; returns whether the rename happened
    pub fn rename(&mut self, new_name: &str) -> bool {
        let result = self.try_rename(new_name);
        self.report("rename", "", result).is_ok()
    }
}
