//! Views: named descriptions of a data region
//!
//! A View is in exactly one of five states. The state and its payload are
//! one enum, so a buffer handle and an external pointer can never coexist:
//!
//! ```text
//! EMPTY    --describe + allocate-->     BUFFER
//! EMPTY    --set_external_data_ptr-->   EXTERNAL
//! EMPTY    --attach_buffer(Some)-->     BUFFER
//! BUFFER   --attach_buffer(None)-->     EMPTY    (orphaned buffer destroyed)
//! EXTERNAL --set_external_data_ptr(None)--> EMPTY
//! EMPTY    --set_scalar / set_string--> SCALAR / STRING
//! ```
//!
//! Mutation goes through [`ViewMut`]. Every operation has a `try_` form
//! returning `Result` and a chainable form that records failures in the
//! DataStore's diagnostics and returns the unchanged receiver.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use meshstore_core::{
    join_path, shape_num_elements, validate_name, Element, Error, IndexType, Result, Schema,
    Shape, TypeId,
};
use smallvec::smallvec;
use tracing::{debug, trace, warn};

use crate::arena::{dangling, GroupId, ViewId};
use crate::buffer::{cast_slice, cast_slice_mut, Buffer};
use crate::datastore::DataStore;
use crate::diagnostics::Diagnostic;

/// What a View currently refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// No data
    Empty,
    /// Aliases (part of) a Buffer
    Buffer,
    /// Wraps caller-owned memory
    External,
    /// Holds one inline numeric value
    Scalar,
    /// Holds an inline string
    String,
}

impl ViewState {
    /// Upper-case name used in logs and exported documents
    pub const fn name(self) -> &'static str {
        match self {
            ViewState::Empty => "EMPTY",
            ViewState::Buffer => "BUFFER",
            ViewState::External => "EXTERNAL",
            ViewState::Scalar => "SCALAR",
            ViewState::String => "STRING",
        }
    }

    /// Parse a state name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EMPTY" => Some(ViewState::Empty),
            "BUFFER" => Some(ViewState::Buffer),
            "EXTERNAL" => Some(ViewState::External),
            "SCALAR" => Some(ViewState::Scalar),
            "STRING" => Some(ViewState::String),
            _ => None,
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-owned memory wrapped by an EXTERNAL View
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalPtr(NonNull<u8>);

// SAFETY: the datastore never dereferences the pointer on its own; typed
// access goes through `set_external_data_ptr`'s contract, which puts the
// synchronization burden on the caller.
unsafe impl Send for ExternalPtr {}
unsafe impl Sync for ExternalPtr {}

impl ExternalPtr {
    /// The wrapped address
    pub fn as_ptr(self) -> NonNull<u8> {
        self.0
    }
}

/// Inline storage for a SCALAR View, aligned for any element type
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(8))]
pub(crate) struct ScalarBytes(pub(crate) [u8; 8]);

impl fmt::Debug for ScalarBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarBytes({:02x?})", self.0)
    }
}

impl ScalarBytes {
    pub(crate) fn from_value<T: Element>(value: T) -> Self {
        let mut bytes = ScalarBytes::default();
        value.write_ne(&mut bytes.0);
        bytes
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ViewData {
    Empty,
    Buffer(usize),
    External(ExternalPtr),
    Scalar(ScalarBytes),
    String(String),
}

/// A named, typed description of a data region
#[derive(Debug)]
pub struct View {
    pub(crate) name: String,
    pub(crate) owner: GroupId,
    pub(crate) data: ViewData,
    pub(crate) schema: Option<Schema>,
    pub(crate) shape: Shape,
    pub(crate) applied: bool,
}

impl View {
    pub(crate) fn new(name: String, owner: GroupId) -> Self {
        View {
            name,
            owner,
            data: ViewData::Empty,
            schema: None,
            shape: Shape::new(),
            applied: false,
        }
    }

    /// Name of the View within its Group
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group that owns this View
    pub fn owning_group(&self) -> GroupId {
        self.owner
    }

    /// Current state
    pub fn state(&self) -> ViewState {
        match self.data {
            ViewData::Empty => ViewState::Empty,
            ViewData::Buffer(_) => ViewState::Buffer,
            ViewData::External(_) => ViewState::External,
            ViewData::Scalar(_) => ViewState::Scalar,
            ViewData::String(_) => ViewState::String,
        }
    }

    /// True in the EMPTY state
    pub fn is_empty(&self) -> bool {
        matches!(self.data, ViewData::Empty)
    }

    /// True if a Buffer is attached
    pub fn has_buffer(&self) -> bool {
        matches!(self.data, ViewData::Buffer(_))
    }

    /// Index of the attached Buffer
    pub fn buffer_index(&self) -> Option<usize> {
        match self.data {
            ViewData::Buffer(index) => Some(index),
            _ => None,
        }
    }

    /// True in the EXTERNAL state
    pub fn is_external(&self) -> bool {
        matches!(self.data, ViewData::External(_))
    }

    /// True in the SCALAR state
    pub fn is_scalar(&self) -> bool {
        matches!(self.data, ViewData::Scalar(_))
    }

    /// True in the STRING state
    pub fn is_string(&self) -> bool {
        matches!(self.data, ViewData::String(_))
    }

    /// True if a type/count description is set
    pub fn is_described(&self) -> bool {
        self.schema.is_some()
    }

    /// True if the description is bound to memory
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// The current description
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Described element type (`NoType` when undescribed)
    pub fn type_id(&self) -> TypeId {
        self.schema.map_or(TypeId::NoType, |s| s.dtype)
    }

    /// Described element count (0 when undescribed)
    pub fn num_elements(&self) -> IndexType {
        self.schema.map_or(0, |s| s.num_elements)
    }

    /// Bytes per described element
    pub fn bytes_per_element(&self) -> usize {
        self.type_id().element_bytes()
    }

    /// `num_elements * bytes_per_element`
    pub fn total_bytes(&self) -> IndexType {
        self.schema.map_or(0, |s| s.total_bytes())
    }

    /// Per-dimension extents
    pub fn shape(&self) -> &[IndexType] {
        &self.shape
    }

    /// Number of dimensions
    pub fn num_dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Inline string value of a STRING View
    pub fn string(&self) -> Option<&str> {
        match &self.data {
            ViewData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Structural comparison: name, type, applied flag, buffer presence and
    /// total bytes. Data contents are not compared.
    pub fn is_equivalent_to(&self, other: &View) -> bool {
        self.name == other.name
            && self.type_id() == other.type_id()
            && self.applied == other.applied
            && self.has_buffer() == other.has_buffer()
            && self.total_bytes() == other.total_bytes()
    }

    fn state_error(&self, path: String, operation: &'static str) -> Error {
        Error::InvalidState {
            path,
            state: self.state().name(),
            operation,
        }
    }
}

/// Start address of a View's data, including the described offset
///
/// `None` when there is nothing to point at or the description no longer
/// fits the attached buffer.
pub(crate) fn data_ptr(store: &DataStore, view: &View) -> Option<NonNull<u8>> {
    let offset = match (view.applied, view.schema) {
        (true, Some(schema)) => schema.offset as usize,
        _ => 0,
    };
    match &view.data {
        ViewData::Empty => None,
        ViewData::External(ptr) => NonNull::new(ptr.0.as_ptr().wrapping_add(offset)),
        ViewData::Buffer(index) => {
            if !view.applied {
                return None;
            }
            let schema = view.schema?;
            let buffer = store.buffer(*index)?;
            if schema.spanned_bytes() > buffer.allocated_bytes() {
                return None;
            }
            NonNull::new(buffer.base_ptr()?.as_ptr().wrapping_add(offset))
        }
        ViewData::Scalar(bytes) => NonNull::new(bytes.0.as_ptr().cast_mut()),
        ViewData::String(s) => NonNull::new(s.as_ptr().cast_mut()),
    }
}

/// Validate typed access and return the schema to read through
fn access_schema<T: Element>(view: &View, path: &str) -> Result<Schema> {
    let schema = view.schema.ok_or_else(|| Error::NotDescribed {
        path: path.to_string(),
    })?;
    if !view.applied {
        return Err(view.state_error(path.to_string(), "data access before apply"));
    }
    if schema.dtype != T::TYPE_ID {
        return Err(Error::TypeMismatch {
            expected: schema.dtype,
            actual: T::TYPE_ID,
        });
    }
    schema.offset_elements(path)?;
    schema.stride_elements(path)?;
    Ok(schema)
}

fn check_capacity(path: &str, schema: &Schema, buffer: &Buffer) -> Result<()> {
    let available = buffer.allocated_bytes();
    if schema.spanned_bytes() > available {
        return Err(Error::InsufficientBuffer {
            path: path.to_string(),
            required: schema.spanned_bytes(),
            available,
        });
    }
    Ok(())
}

fn check_external_alignment<T: Element>(ptr: *const u8, path: &str) -> Result<()> {
    if ptr as usize % std::mem::align_of::<T>() != 0 {
        return Err(Error::InvalidState {
            path: path.to_string(),
            state: ViewState::External.name(),
            operation: "typed access to unaligned memory",
        });
    }
    Ok(())
}

fn read_strided<T: Element>(span: &[u8], schema: &Schema, index: IndexType) -> Result<T> {
    if index < 0 || index >= schema.num_elements {
        return Err(Error::IndexOutOfRange {
            index,
            len: schema.num_elements,
        });
    }
    let at = (index * schema.stride) as usize;
    Ok(T::read_ne(&span[at..]))
}

/// Shared access to a View together with its DataStore
#[derive(Clone, Copy)]
pub struct ViewRef<'a> {
    pub(crate) store: &'a DataStore,
    pub(crate) id: ViewId,
    pub(crate) view: &'a View,
}

impl<'a> Deref for ViewRef<'a> {
    type Target = View;

    fn deref(&self) -> &View {
        self.view
    }
}

impl fmt::Debug for ViewRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRef")
            .field("id", &self.id)
            .field("path", &self.path_name())
            .field("state", &self.state())
            .finish()
    }
}

impl<'a> ViewRef<'a> {
    /// Handle of this View
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Path of the owning Group
    pub fn path(&self) -> String {
        self.store.group_path(self.view.owner)
    }

    /// Full path, including the View's own name
    pub fn path_name(&self) -> String {
        join_path(&self.path(), &self.view.name)
    }

    /// The attached Buffer
    pub fn buffer(&self) -> Option<&'a Buffer> {
        self.view.buffer_index().and_then(|i| self.store.buffer(i))
    }

    /// True if the View holds data it could be applied to
    pub fn is_allocated(&self) -> bool {
        match self.view.data {
            ViewData::Empty => false,
            ViewData::Buffer(_) => {
                self.view.is_described() && self.buffer().map_or(false, Buffer::is_allocated)
            }
            ViewData::External(_) | ViewData::Scalar(_) | ViewData::String(_) => true,
        }
    }

    /// Described offset in elements (0 when undescribed)
    pub fn offset(&self) -> Result<IndexType> {
        match self.view.schema {
            Some(schema) => schema.offset_elements(&self.path_name()),
            None => Ok(0),
        }
    }

    /// Described stride in elements (1 when undescribed)
    pub fn stride(&self) -> Result<IndexType> {
        match self.view.schema {
            Some(schema) => schema.stride_elements(&self.path_name()),
            None => Ok(1),
        }
    }

    /// Address of the first described element
    ///
    /// For EXTERNAL Views that are not applied this is the raw pointer as
    /// given. BUFFER Views return `None` until applied.
    pub fn void_ptr(&self) -> Option<NonNull<u8>> {
        data_ptr(self.store, self.view)
    }

    /// Value of a SCALAR View
    pub fn scalar<T: Element>(&self) -> Result<T> {
        match &self.view.data {
            ViewData::Scalar(bytes) => {
                if self.view.type_id() != T::TYPE_ID {
                    return Err(Error::TypeMismatch {
                        expected: self.view.type_id(),
                        actual: T::TYPE_ID,
                    });
                }
                Ok(T::read_ne(&bytes.0))
            }
            _ => Err(self.view.state_error(self.path_name(), "scalar access")),
        }
    }

    /// Bytes from the first element through the last one
    fn span(&self, schema: &Schema) -> Result<&'a [u8]> {
        let start = schema.offset as usize;
        let end = schema.spanned_bytes().max(schema.offset) as usize;
        match &self.view.data {
            ViewData::Buffer(index) => {
                let path = self.path_name();
                let buffer = self.store.buffer(*index).ok_or_else(|| Error::NotFound {
                    kind: meshstore_core::EntityKind::Buffer,
                    name: index.to_string(),
                })?;
                check_capacity(&path, schema, buffer)?;
                Ok(&buffer.bytes()[start..end])
            }
            ViewData::External(ptr) => {
                let first = ptr.0.as_ptr().wrapping_add(start);
                // SAFETY: `set_external_data_ptr` requires the caller to keep
                // the described bytes valid for as long as the View wraps them.
                Ok(unsafe { std::slice::from_raw_parts(first.cast_const(), end - start) })
            }
            ViewData::Scalar(bytes) => Ok(&bytes.0[start..end]),
            ViewData::Empty | ViewData::String(_) => {
                Err(self.view.state_error(self.path_name(), "typed access"))
            }
        }
    }

    /// Described elements as a slice
    ///
    /// Requires an applied View of element type `T` with unit stride.
    pub fn data<T: Element>(&self) -> Result<&'a [T]> {
        let path = self.path_name();
        let schema = access_schema::<T>(self.view, &path)?;
        if !schema.is_compact() {
            return Err(Error::NonContiguous { path });
        }
        let span = self.span(&schema)?;
        check_external_alignment::<T>(span.as_ptr(), &path)?;
        Ok(cast_slice(span))
    }

    /// Element `index`, honouring offset and stride
    pub fn value_at<T: Element>(&self, index: IndexType) -> Result<T> {
        let path = self.path_name();
        let schema = access_schema::<T>(self.view, &path)?;
        let span = self.span(&schema)?;
        read_strided(span, &schema, index)
    }
}

/// Exclusive access to a View for mutation
pub struct ViewMut<'a> {
    pub(crate) store: &'a mut DataStore,
    pub(crate) id: ViewId,
}

impl fmt::Debug for ViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMut")
            .field("id", &self.id)
            .field("state", &self.entry().state())
            .finish()
    }
}

impl<'a> ViewMut<'a> {
    /// Handle of this View
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Shared access to the same View
    pub fn view(&self) -> ViewRef<'_> {
        ViewRef {
            store: &*self.store,
            id: self.id,
            view: self.entry(),
        }
    }

    /// Full path of the View
    pub fn path_name(&self) -> String {
        self.store.view_path(self.id)
    }

    fn entry(&self) -> &View {
        self.store
            .views
            .get(self.id)
            .unwrap_or_else(|| dangling(self.id))
    }

    fn entry_mut(&mut self) -> &mut View {
        let id = self.id;
        self.store.views.get_mut(id).unwrap_or_else(|| dangling(id))
    }

    fn state_error(&self, operation: &'static str) -> Error {
        self.entry().state_error(self.path_name(), operation)
    }

    fn check(&mut self, operation: &'static str, result: Result<()>) -> &mut Self {
        if let Err(err) = result {
            let path = self.path_name();
            let state = self.entry().state().name();
            warn!(
                target: "meshstore::view",
                path = %path,
                state,
                operation,
                error = %err,
                "view operation rejected"
            );
            self.store
                .record(Diagnostic::new(path, operation, Some(state), &err));
        }
        self
    }

    fn set_description(&mut self, schema: Schema, shape: Shape) {
        let view = self.entry_mut();
        view.schema = Some(schema);
        view.shape = shape;
        view.applied = false;
    }

    // ---------------------------------------------------------------
    // describe
    // ---------------------------------------------------------------

    /// Describe the View as `num_elements` elements of `dtype`
    ///
    /// Clears the applied flag.
    pub fn try_describe(&mut self, dtype: TypeId, num_elements: IndexType) -> Result<()> {
        self.try_describe_shape(dtype, &[num_elements])
    }

    /// Chainable [`try_describe`](Self::try_describe)
    pub fn describe(&mut self, dtype: TypeId, num_elements: IndexType) -> &mut Self {
        let result = self.try_describe(dtype, num_elements);
        self.check("describe", result)
    }

    /// Describe the View with a multi-dimensional shape
    pub fn try_describe_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> Result<()> {
        let schema = validated_schema(dtype, shape)?;
        if matches!(self.entry().data, ViewData::Scalar(_) | ViewData::String(_)) {
            return Err(self.state_error("describe"));
        }
        self.set_description(schema, Shape::from_slice(shape));
        trace!(target: "meshstore::view", path = %self.path_name(), %dtype, "described");
        Ok(())
    }

    /// Chainable [`try_describe_shape`](Self::try_describe_shape)
    pub fn describe_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> &mut Self {
        let result = self.try_describe_shape(dtype, shape);
        self.check("describe", result)
    }

    // ---------------------------------------------------------------
    // allocate / reallocate / deallocate
    // ---------------------------------------------------------------

    /// Allocation is valid in EMPTY, or in BUFFER when this View is the
    /// Buffer's only one.
    fn check_allocate_valid(&self) -> Result<()> {
        match self.entry().data {
            ViewData::Empty => Ok(()),
            ViewData::Buffer(index) => {
                let views = self.store.buffer(index).map_or(0, Buffer::num_views);
                if views != 1 {
                    return Err(Error::SharedBuffer {
                        path: self.path_name(),
                        buffer: index,
                        views,
                    });
                }
                Ok(())
            }
            _ => Err(self.state_error("allocate")),
        }
    }

    /// Allocate memory for the current description and apply it
    ///
    /// An EMPTY View gets a fresh Buffer and moves to BUFFER.
    pub fn try_allocate(&mut self) -> Result<()> {
        self.check_allocate_valid()?;
        let schema = self.entry().schema.ok_or_else(|| Error::NotDescribed {
            path: self.path_name(),
        })?;
        let index = match self.entry().data {
            ViewData::Buffer(index) => index,
            _ => {
                let index = self.store.create_buffer();
                self.attach_raw(index);
                index
            }
        };

        let elem = schema.element_bytes() as IndexType;
        let needed = (schema.spanned_bytes() + elem - 1) / elem;
        let count = schema.num_elements.max(needed);
        let buffer = self
            .store
            .buffer_mut(index)
            .unwrap_or_else(|| dangling(index));
        buffer.allocate_unchecked(schema.dtype, count);

        debug!(
            target: "meshstore::view",
            path = %self.path_name(),
            buffer = index,
            "allocated view data"
        );
        self.entry_mut().applied = true;
        Ok(())
    }

    /// Chainable [`try_allocate`](Self::try_allocate)
    pub fn allocate(&mut self) -> &mut Self {
        let result = self.try_allocate();
        self.check("allocate", result)
    }

    /// Describe as `num_elements` of `dtype`, then allocate
    pub fn try_allocate_typed(&mut self, dtype: TypeId, num_elements: IndexType) -> Result<()> {
        self.try_allocate_shape(dtype, &[num_elements])
    }

    /// Chainable [`try_allocate_typed`](Self::try_allocate_typed)
    pub fn allocate_typed(&mut self, dtype: TypeId, num_elements: IndexType) -> &mut Self {
        let result = self.try_allocate_typed(dtype, num_elements);
        self.check("allocate", result)
    }

    /// Describe with a shape, then allocate
    pub fn try_allocate_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> Result<()> {
        let schema = validated_schema(dtype, shape)?;
        self.check_allocate_valid()?;
        self.set_description(schema, Shape::from_slice(shape));
        self.try_allocate()
    }

    /// Chainable [`try_allocate_shape`](Self::try_allocate_shape)
    pub fn allocate_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> &mut Self {
        let result = self.try_allocate_shape(dtype, shape);
        self.check("allocate", result)
    }

    /// Resize to `num_elements`, keeping the described type
    ///
    /// EMPTY behaves like `allocate_typed`. An allocated BUFFER View keeps
    /// the leading bytes and is re-applied.
    pub fn try_reallocate(&mut self, num_elements: IndexType) -> Result<()> {
        if num_elements < 0 {
            return Err(Error::NegativeCount {
                count: num_elements,
            });
        }
        let dtype = self.entry().type_id();
        if !dtype.is_valid() {
            return Err(Error::NotDescribed {
                path: self.path_name(),
            });
        }
        self.check_allocate_valid()?;
        let allocated = self
            .entry()
            .buffer_index()
            .and_then(|i| self.store.buffer(i))
            .map_or(false, Buffer::is_allocated);
        if !allocated {
            return self.try_allocate_typed(dtype, num_elements);
        }

        let index = self.entry().buffer_index().unwrap_or_else(|| dangling(self.id));
        self.set_description(Schema::new(dtype, num_elements), smallvec![num_elements]);
        self.store
            .buffer_mut(index)
            .unwrap_or_else(|| dangling(index))
            .reallocate(num_elements)?;
        self.entry_mut().applied = true;
        Ok(())
    }

    /// Chainable [`try_reallocate`](Self::try_reallocate)
    pub fn reallocate(&mut self, num_elements: IndexType) -> &mut Self {
        let result = self.try_reallocate(num_elements);
        self.check("reallocate", result)
    }

    /// Release the attached Buffer's memory
    ///
    /// The View stays attached and is no longer applied. EMPTY is a no-op.
    pub fn try_deallocate(&mut self) -> Result<()> {
        match self.entry().data {
            ViewData::Empty => Ok(()),
            ViewData::Buffer(index) => {
                self.check_allocate_valid()?;
                if let Some(buffer) = self.store.buffer_mut(index) {
                    buffer.deallocate();
                }
                self.entry_mut().applied = false;
                Ok(())
            }
            _ => Err(self.state_error("deallocate")),
        }
    }

    /// Chainable [`try_deallocate`](Self::try_deallocate)
    pub fn deallocate(&mut self) -> &mut Self {
        let result = self.try_deallocate();
        self.check("deallocate", result)
    }

    // ---------------------------------------------------------------
    // buffers
    // ---------------------------------------------------------------

    fn attach_raw(&mut self, index: usize) {
        let id = self.id;
        if let Some(buffer) = self.store.buffer_mut(index) {
            buffer.attach(id);
        }
        let view = self.entry_mut();
        view.data = ViewData::Buffer(index);
        view.applied = false;
    }

    /// Detach from the current Buffer and destroy it if no View is left
    fn release_buffer(&mut self) {
        if let Some(old) = self.detach_buffer() {
            let orphaned = self.store.buffer(old).map_or(false, |b| b.num_views() == 0);
            if orphaned {
                self.store.remove_buffer(old);
            }
        }
    }

    /// Attach `buffer`, or detach with `None`
    ///
    /// A previously attached Buffer is detached first and destroyed when
    /// this was its last View. After attaching, a described View over
    /// allocated memory is applied.
    pub fn try_attach_buffer(&mut self, buffer: Option<usize>) -> Result<()> {
        let current = match self.entry().data {
            ViewData::Empty => None,
            ViewData::Buffer(index) => Some(index),
            _ => return Err(self.state_error("attach_buffer")),
        };
        let Some(index) = buffer else {
            self.release_buffer();
            return Ok(());
        };
        if self.store.buffer(index).is_none() {
            return Err(Error::NotFound {
                kind: meshstore_core::EntityKind::Buffer,
                name: index.to_string(),
            });
        }
        if current == Some(index) {
            return Ok(());
        }
        self.release_buffer();
        self.attach_raw(index);

        let fits = match (self.entry().schema, self.store.buffer(index)) {
            (Some(schema), Some(buf)) => {
                buf.is_allocated() && schema.spanned_bytes() <= buf.allocated_bytes()
            }
            _ => false,
        };
        if fits {
            self.entry_mut().applied = true;
        }
        debug!(
            target: "meshstore::view",
            path = %self.path_name(),
            buffer = index,
            applied = fits,
            "attached buffer"
        );
        Ok(())
    }

    /// Chainable [`try_attach_buffer`](Self::try_attach_buffer)
    pub fn attach_buffer(&mut self, buffer: Option<usize>) -> &mut Self {
        let result = self.try_attach_buffer(buffer);
        self.check("attach_buffer", result)
    }

    /// Detach from the Buffer without destroying it
    ///
    /// Returns the detached Buffer's index; the View becomes EMPTY.
    pub fn detach_buffer(&mut self) -> Option<usize> {
        let index = self.entry().buffer_index()?;
        let id = self.id;
        if let Some(buffer) = self.store.buffer_mut(index) {
            buffer.detach(id);
        }
        let view = self.entry_mut();
        view.data = ViewData::Empty;
        view.applied = false;
        Some(index)
    }

    // ---------------------------------------------------------------
    // apply
    // ---------------------------------------------------------------

    fn check_apply_valid(&self, schema: &Schema) -> Result<()> {
        match self.entry().data {
            ViewData::External(_) => Ok(()),
            ViewData::Buffer(index) => {
                let buffer = self.store.buffer(index).unwrap_or_else(|| dangling(index));
                check_capacity(&self.path_name(), schema, buffer)
            }
            _ => Err(self.state_error("apply")),
        }
    }

    fn commit_applied(&mut self, schema: Schema, shape: Shape) {
        let view = self.entry_mut();
        view.schema = Some(schema);
        view.shape = shape;
        view.applied = true;
        trace!(target: "meshstore::view", path = %self.path_name(), "applied");
    }

    /// Bind the current description to the View's memory
    ///
    /// Valid for described EXTERNAL Views and for BUFFER Views whose
    /// description fits in the Buffer's allocated bytes. Idempotent.
    pub fn try_apply(&mut self) -> Result<()> {
        let schema = self.entry().schema.ok_or_else(|| Error::NotDescribed {
            path: self.path_name(),
        })?;
        self.check_apply_valid(&schema)?;
        self.entry_mut().applied = true;
        Ok(())
    }

    /// Chainable [`try_apply`](Self::try_apply)
    pub fn apply(&mut self) -> &mut Self {
        let result = self.try_apply();
        self.check("apply", result)
    }

    /// Re-describe with count, offset and stride (in elements), then apply
    ///
    /// An undescribed BUFFER View takes its type from the Buffer.
    pub fn try_apply_with(
        &mut self,
        num_elements: IndexType,
        offset: IndexType,
        stride: IndexType,
    ) -> Result<()> {
        let mut dtype = self.entry().type_id();
        if !dtype.is_valid() {
            dtype = self
                .entry()
                .buffer_index()
                .and_then(|i| self.store.buffer(i))
                .map_or(TypeId::NoType, Buffer::type_id);
        }
        if !dtype.is_valid() {
            return Err(Error::NotDescribed {
                path: self.path_name(),
            });
        }
        self.try_apply_typed(dtype, num_elements, offset, stride)
    }

    /// Chainable [`try_apply_with`](Self::try_apply_with)
    pub fn apply_with(
        &mut self,
        num_elements: IndexType,
        offset: IndexType,
        stride: IndexType,
    ) -> &mut Self {
        let result = self.try_apply_with(num_elements, offset, stride);
        self.check("apply", result)
    }

    /// Describe with an explicit type, count, offset and stride, then apply
    pub fn try_apply_typed(
        &mut self,
        dtype: TypeId,
        num_elements: IndexType,
        offset: IndexType,
        stride: IndexType,
    ) -> Result<()> {
        let _ = validated_schema(dtype, &[num_elements])?;
        if offset < 0 || stride < 1 {
            return Err(Error::InvalidLayout {
                path: self.path_name(),
                offset,
                stride,
            });
        }
        let schema = Schema::with_layout(dtype, num_elements, offset, stride);
        self.check_apply_valid(&schema)?;
        self.commit_applied(schema, smallvec![num_elements]);
        Ok(())
    }

    /// Chainable [`try_apply_typed`](Self::try_apply_typed)
    pub fn apply_typed(
        &mut self,
        dtype: TypeId,
        num_elements: IndexType,
        offset: IndexType,
        stride: IndexType,
    ) -> &mut Self {
        let result = self.try_apply_typed(dtype, num_elements, offset, stride);
        self.check("apply", result)
    }

    /// Describe with a shape, then apply
    pub fn try_apply_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> Result<()> {
        let schema = validated_schema(dtype, shape)?;
        self.check_apply_valid(&schema)?;
        self.commit_applied(schema, Shape::from_slice(shape));
        Ok(())
    }

    /// Chainable [`try_apply_shape`](Self::try_apply_shape)
    pub fn apply_shape(&mut self, dtype: TypeId, shape: &[IndexType]) -> &mut Self {
        let result = self.try_apply_shape(dtype, shape);
        self.check("apply", result)
    }

    // ---------------------------------------------------------------
    // external, scalar and string data
    // ---------------------------------------------------------------

    /// Wrap caller-owned memory, or drop it with `None`
    ///
    /// A described View is applied immediately.
    ///
    /// # Safety
    ///
    /// While the View wraps `ptr`, the memory must stay valid for the bytes
    /// its description spans, be aligned for the described element type, and
    /// not be mutated through other references while the View's data is
    /// borrowed.
    pub unsafe fn try_set_external_data_ptr(&mut self, ptr: Option<NonNull<u8>>) -> Result<()> {
        if !matches!(self.entry().data, ViewData::Empty | ViewData::External(_)) {
            return Err(self.state_error("set_external_data_ptr"));
        }
        let view = self.entry_mut();
        match ptr {
            None => {
                view.data = ViewData::Empty;
                view.applied = false;
            }
            Some(ptr) => {
                view.data = ViewData::External(ExternalPtr(ptr));
                view.applied = view.schema.is_some();
            }
        }
        debug!(
            target: "meshstore::view",
            path = %self.path_name(),
            state = %self.entry().state(),
            "set external data"
        );
        Ok(())
    }

    /// Chainable [`try_set_external_data_ptr`](Self::try_set_external_data_ptr)
    ///
    /// # Safety
    ///
    /// Same contract as `try_set_external_data_ptr`.
    pub unsafe fn set_external_data_ptr(&mut self, ptr: Option<NonNull<u8>>) -> &mut Self {
        let result = self.try_set_external_data_ptr(ptr);
        self.check("set_external_data_ptr", result)
    }

    fn check_inline_valid(&self, operation: &'static str) -> Result<()> {
        match self.entry().data {
            ViewData::Empty | ViewData::Scalar(_) | ViewData::String(_) => Ok(()),
            _ => Err(self.state_error(operation)),
        }
    }

    /// Store an inline scalar; the View becomes SCALAR and applied
    pub fn try_set_scalar<T: Element>(&mut self, value: T) -> Result<()> {
        self.check_inline_valid("set_scalar")?;
        let view = self.entry_mut();
        view.data = ViewData::Scalar(ScalarBytes::from_value(value));
        view.schema = Some(Schema::new(T::TYPE_ID, 1));
        view.shape = smallvec![1];
        view.applied = true;
        Ok(())
    }

    /// Chainable [`try_set_scalar`](Self::try_set_scalar)
    pub fn set_scalar<T: Element>(&mut self, value: T) -> &mut Self {
        let result = self.try_set_scalar(value);
        self.check("set_scalar", result)
    }

    /// Store an inline string; the View becomes STRING and applied
    pub fn try_set_string(&mut self, value: &str) -> Result<()> {
        self.check_inline_valid("set_string")?;
        let len = value.len() as IndexType;
        let view = self.entry_mut();
        view.data = ViewData::String(value.to_string());
        view.schema = Some(Schema::new(TypeId::Char8, len));
        view.shape = smallvec![len];
        view.applied = true;
        Ok(())
    }

    /// Chainable [`try_set_string`](Self::try_set_string)
    pub fn set_string(&mut self, value: &str) -> &mut Self {
        let result = self.try_set_string(value);
        self.check("set_string", result)
    }

    // ---------------------------------------------------------------
    // naming
    // ---------------------------------------------------------------

    /// Rename within the owning Group
    ///
    /// Rejects empty names, names with the path delimiter and names already
    /// used by a sibling View or Group.
    pub fn try_rename(&mut self, new_name: &str) -> Result<()> {
        let (owner, old) = {
            let view = self.entry();
            (view.owner, view.name.clone())
        };
        if old == new_name {
            return Ok(());
        }
        validate_name(new_name).map_err(|reason| Error::InvalidName {
            name: new_name.to_string(),
            reason,
        })?;
        let group = self.store.groups.get(owner).unwrap_or_else(|| dangling(owner));
        if group.has_child(new_name) {
            return Err(Error::NameCollision {
                group: self.store.group_path(owner),
                name: new_name.to_string(),
            });
        }
        let group = self
            .store
            .groups
            .get_mut(owner)
            .unwrap_or_else(|| dangling(owner));
        group.views.rename(&old, new_name);
        self.entry_mut().name = new_name.to_string();
        Ok(())
    }

    /// Chainable form of [`try_rename`](Self::try_rename); returns whether
    /// the rename happened
    pub fn rename(&mut self, new_name: &str) -> bool {
        let result = self.try_rename(new_name);
        let ok = result.is_ok();
        self.check("rename", result);
        ok
    }

    // ---------------------------------------------------------------
    // data access
    // ---------------------------------------------------------------

    fn span_mut(&mut self, schema: &Schema) -> Result<&mut [u8]> {
        let start = schema.offset as usize;
        let end = schema.spanned_bytes().max(schema.offset) as usize;
        let path = self.path_name();
        if let Some(index) = self.entry().buffer_index() {
            let buffer = self.store.buffer_mut(index).ok_or_else(|| Error::NotFound {
                kind: meshstore_core::EntityKind::Buffer,
                name: index.to_string(),
            })?;
            check_capacity(&path, schema, buffer)?;
            return Ok(&mut buffer.bytes_mut()[start..end]);
        }
        let state = self.entry().state().name();
        match &mut self.entry_mut().data {
            ViewData::External(ptr) => {
                let first = ptr.0.as_ptr().wrapping_add(start);
                // SAFETY: see `set_external_data_ptr`.
                Ok(unsafe { std::slice::from_raw_parts_mut(first, end - start) })
            }
            ViewData::Scalar(bytes) => Ok(&mut bytes.0[start..end]),
            _ => Err(Error::InvalidState {
                path,
                state,
                operation: "typed access",
            }),
        }
    }

    /// Described elements as a mutable slice
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let path = self.path_name();
        let schema = access_schema::<T>(self.entry(), &path)?;
        if !schema.is_compact() {
            return Err(Error::NonContiguous { path });
        }
        let span = self.span_mut(&schema)?;
        check_external_alignment::<T>(span.as_ptr(), &path)?;
        Ok(cast_slice_mut(span))
    }

    /// Overwrite element `index`, honouring offset and stride
    pub fn set_value_at<T: Element>(&mut self, index: IndexType, value: T) -> Result<()> {
        let path = self.path_name();
        let schema = access_schema::<T>(self.entry(), &path)?;
        if index < 0 || index >= schema.num_elements {
            return Err(Error::IndexOutOfRange {
                index,
                len: schema.num_elements,
            });
        }
        let at = (index * schema.stride) as usize;
        let span = self.span_mut(&schema)?;
        value.write_ne(&mut span[at..]);
        Ok(())
    }
}

fn validated_schema(dtype: TypeId, shape: &[IndexType]) -> Result<Schema> {
    if !dtype.is_valid() {
        return Err(Error::NoType);
    }
    if let Some(&bad) = shape.iter().find(|&&d| d < 0) {
        return Err(Error::NegativeCount { count: bad });
    }
    Ok(Schema::new(dtype, shape_num_elements(shape)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_view(name: &str) -> (DataStore, ViewId) {
        let mut ds = DataStore::new();
        let id = ds.root_mut().create_view(name).unwrap();
        (ds, id)
    }

    #[test]
    fn test_state_names_round_trip() {
        for state in [
            ViewState::Empty,
            ViewState::Buffer,
            ViewState::External,
            ViewState::Scalar,
            ViewState::String,
        ] {
            assert_eq!(ViewState::from_name(state.name()), Some(state));
        }
        assert_eq!(ViewState::from_name("UNKNOWN"), None);
    }

    #[test]
    fn test_new_view_is_empty() {
        let (ds, id) = store_with_view("v");
        let v = ds.view(id).unwrap();
        assert_eq!(v.state(), ViewState::Empty);
        assert!(!v.is_described());
        assert!(!v.is_applied());
        assert!(!v.is_allocated());
        assert!(v.void_ptr().is_none());
        assert_eq!(v.offset().unwrap(), 0);
        assert_eq!(v.stride().unwrap(), 1);
    }

    #[test]
    fn test_allocate_moves_empty_to_buffer() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Float64, 6);
        let v = ds.view(id).unwrap();
        assert_eq!(v.state(), ViewState::Buffer);
        assert!(v.is_applied());
        assert!(v.is_allocated());
        assert_eq!(v.total_bytes(), 48);
        assert_eq!(v.buffer().unwrap().num_views(), 1);
        assert!(ds.diagnostics().is_empty());
    }

    #[test]
    fn test_allocate_without_description_is_diagnosed() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate();
        assert_eq!(ds.view(id).unwrap().state(), ViewState::Empty);
        assert_eq!(ds.diagnostics().len(), 1);
        assert_eq!(ds.diagnostics()[0].kind, "not_described");
        assert_eq!(ds.num_buffers(), 0);
    }

    #[test]
    fn test_allocate_on_shared_buffer_is_rejected() {
        let mut ds = DataStore::new();
        let a = ds.root_mut().create_view_and_allocate("a", TypeId::Int32, 4).unwrap();
        let buffer = ds.view(a).unwrap().buffer_index().unwrap();
        let b = ds.root_mut().create_view("b").unwrap();
        ds.view_mut(b).unwrap().describe(TypeId::Int32, 2).attach_buffer(Some(buffer));

        let err = ds.view_mut(a).unwrap().try_allocate_typed(TypeId::Int32, 8).unwrap_err();
        assert!(matches!(err, Error::SharedBuffer { views: 2, .. }));
        // Unchanged on failure.
        assert_eq!(ds.view(a).unwrap().num_elements(), 4);
        assert_eq!(ds.buffer(buffer).unwrap().num_elements(), 4);
    }

    #[test]
    fn test_chain_continues_after_failure() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id)
            .unwrap()
            .apply()
            .describe(TypeId::Int32, 3)
            .allocate();
        let v = ds.view(id).unwrap();
        assert!(v.is_applied());
        assert_eq!(ds.diagnostics().len(), 1);
        assert_eq!(ds.diagnostics()[0].operation, "apply");
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 10);
        ds.view_mut(id).unwrap().apply();
        let (ptr1, shape1) = {
            let v = ds.view(id).unwrap();
            (v.void_ptr(), v.shape().to_vec())
        };
        ds.view_mut(id).unwrap().apply();
        let v = ds.view(id).unwrap();
        assert_eq!(v.void_ptr(), ptr1);
        assert_eq!(v.shape(), shape1.as_slice());
        assert!(ds.diagnostics().is_empty());
    }

    #[test]
    fn test_apply_with_offset_and_stride() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 10);
        {
            let mut v = ds.view_mut(id).unwrap();
            for (i, x) in v.data_mut::<i32>().unwrap().iter_mut().enumerate() {
                *x = i as i32 * 10;
            }
            v.try_apply_with(3, 1, 3).unwrap();
        }
        let v = ds.view(id).unwrap();
        assert_eq!(v.offset().unwrap(), 1);
        assert_eq!(v.stride().unwrap(), 3);
        assert_eq!(v.value_at::<i32>(0).unwrap(), 10);
        assert_eq!(v.value_at::<i32>(2).unwrap(), 70);
        assert!(matches!(v.data::<i32>(), Err(Error::NonContiguous { .. })));
        assert!(matches!(
            v.value_at::<i32>(3),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_apply_beyond_buffer_fails() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 4);
        let err = ds.view_mut(id).unwrap().try_apply_with(4, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBuffer {
                required: 20,
                available: 16,
                ..
            }
        ));
        assert_eq!(ds.view(id).unwrap().offset().unwrap(), 0);
    }

    #[test]
    fn test_apply_rejects_bad_layout() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 4);
        let err = ds.view_mut(id).unwrap().try_apply_with(2, -1, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { offset: -1, .. }));
        let err = ds.view_mut(id).unwrap().try_apply_with(2, 0, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { stride: 0, .. }));
    }

    #[test]
    fn test_void_ptr_includes_offset() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Float64, 8);
        ds.view_mut(id).unwrap().apply_with(4, 2, 1);
        let v = ds.view(id).unwrap();
        let base = v.buffer().unwrap().base_ptr().unwrap().as_ptr() as usize;
        assert_eq!(v.void_ptr().unwrap().as_ptr() as usize, base + 16);
    }

    #[test]
    fn test_reallocate_preserves_and_reapplies() {
        let (mut ds, id) = store_with_view("v");
        {
            let mut v = ds.view_mut(id).unwrap();
            v.allocate_typed(TypeId::Int64, 4);
            v.data_mut::<i64>().unwrap().copy_from_slice(&[1, 2, 3, 4]);
            v.reallocate(6);
        }
        let v = ds.view(id).unwrap();
        assert!(v.is_applied());
        assert_eq!(v.data::<i64>().unwrap(), &[1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_reallocate_negative_is_diagnosed() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int64, 4).reallocate(-2);
        assert_eq!(ds.view(id).unwrap().num_elements(), 4);
        assert_eq!(ds.diagnostics()[0].kind, "negative_count");
    }

    #[test]
    fn test_deallocate_unapplies_but_keeps_buffer() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id)
            .unwrap()
            .allocate_typed(TypeId::UInt8, 3)
            .deallocate();
        let v = ds.view(id).unwrap();
        assert_eq!(v.state(), ViewState::Buffer);
        assert!(!v.is_applied());
        assert!(!v.is_allocated());
        assert!(v.void_ptr().is_none());
    }

    #[test]
    fn test_attach_null_destroys_orphaned_buffer() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 2);
        assert_eq!(ds.num_buffers(), 1);
        ds.view_mut(id).unwrap().attach_buffer(None);
        assert_eq!(ds.view(id).unwrap().state(), ViewState::Empty);
        assert_eq!(ds.num_buffers(), 0);
    }

    #[test]
    fn test_detach_keeps_buffer() {
        let (mut ds, id) = store_with_view("v");
        ds.view_mut(id).unwrap().allocate_typed(TypeId::Int32, 2);
        let index = ds.view_mut(id).unwrap().detach_buffer().unwrap();
        assert!(ds.buffer(index).is_some());
        assert_eq!(ds.buffer(index).unwrap().num_views(), 0);
        assert_eq!(ds.view(id).unwrap().state(), ViewState::Empty);
    }

    #[test]
    fn test_attach_replaces_and_reapplies() {
        let mut ds = DataStore::new();
        let first = ds.create_buffer_typed(TypeId::Float32, 4).unwrap();
        let second = ds.create_buffer_typed(TypeId::Float32, 8).unwrap();
        let id = ds.root_mut().create_view("v").unwrap();
        ds.view_mut(id)
            .unwrap()
            .describe(TypeId::Float32, 4)
            .attach_buffer(Some(first));
        assert!(ds.view(id).unwrap().is_applied());

        ds.view_mut(id).unwrap().attach_buffer(Some(second));
        let v = ds.view(id).unwrap();
        assert_eq!(v.buffer_index(), Some(second));
        assert!(v.is_applied());
        // First buffer lost its only view and was destroyed.
        assert!(ds.buffer(first).is_none());
    }

    #[test]
    fn test_attach_to_missing_buffer() {
        let (mut ds, id) = store_with_view("v");
        let err = ds.view_mut(id).unwrap().try_attach_buffer(Some(7)).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_external_data() {
        let mut data = [1.5f64, 2.5, 3.5];
        let (mut ds, id) = store_with_view("ext");
        let ptr = NonNull::new(data.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe {
            ds.view_mut(id)
                .unwrap()
                .describe(TypeId::Float64, 3)
                .set_external_data_ptr(Some(ptr));
        }
        {
            let v = ds.view(id).unwrap();
            assert_eq!(v.state(), ViewState::External);
            assert!(v.is_applied());
            assert_eq!(v.void_ptr(), Some(ptr));
            assert_eq!(v.data::<f64>().unwrap(), &[1.5, 2.5, 3.5]);
        }
        ds.view_mut(id).unwrap().data_mut::<f64>().unwrap()[1] = 9.0;
        unsafe {
            ds.view_mut(id).unwrap().set_external_data_ptr(None);
        }
        assert_eq!(ds.view(id).unwrap().state(), ViewState::Empty);
        assert_eq!(data[1], 9.0);
    }

    #[test]
    fn test_allocate_on_external_is_rejected() {
        let mut data = [0u8; 4];
        let (mut ds, id) = store_with_view("ext");
        unsafe {
            ds.view_mut(id)
                .unwrap()
                .set_external_data_ptr(NonNull::new(data.as_mut_ptr()));
        }
        let mut v = ds.view_mut(id).unwrap();
        let err = v.try_allocate_typed(TypeId::UInt8, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: "EXTERNAL",
                ..
            }
        ));
        assert!(!v.view().is_described());
    }

    #[test]
    fn test_scalar_and_string() {
        let (mut ds, id) = store_with_view("s");
        ds.view_mut(id).unwrap().set_scalar(42i32);
        {
            let v = ds.view(id).unwrap();
            assert_eq!(v.state(), ViewState::Scalar);
            assert_eq!(v.scalar::<i32>().unwrap(), 42);
            assert!(v.scalar::<f64>().is_err());
            assert_eq!(v.data::<i32>().unwrap(), &[42]);
            let ptr = v.void_ptr().unwrap();
            assert_eq!(unsafe { *ptr.as_ptr().cast::<i32>() }, 42);
        }
        ds.view_mut(id).unwrap().set_string("hello");
        let v = ds.view(id).unwrap();
        assert_eq!(v.state(), ViewState::String);
        assert_eq!(v.string(), Some("hello"));
        assert_eq!(v.type_id(), TypeId::Char8);
        assert_eq!(v.num_elements(), 5);
    }

    #[test]
    fn test_describe_scalar_is_rejected() {
        let (mut ds, id) = store_with_view("s");
        ds.view_mut(id).unwrap().set_scalar(1.0f32).describe(TypeId::Int8, 4);
        assert_eq!(ds.view(id).unwrap().type_id(), TypeId::Float32);
        assert_eq!(ds.diagnostics().len(), 1);
    }

    #[test]
    fn test_describe_shape() {
        let (mut ds, id) = store_with_view("m");
        ds.view_mut(id)
            .unwrap()
            .allocate_shape(TypeId::Float64, &[2, 3, 4]);
        let v = ds.view(id).unwrap();
        assert_eq!(v.num_elements(), 24);
        assert_eq!(v.shape(), &[2, 3, 4]);
        assert_eq!(v.num_dimensions(), 3);
    }

    #[test]
    fn test_rename() {
        let mut ds = DataStore::new();
        let a = ds.root_mut().create_view("a").unwrap();
        ds.root_mut().create_view("b").unwrap();
        ds.root_mut().create_group("g").unwrap();

        let mut v = ds.view_mut(a).unwrap();
        assert!(!v.rename("b"));
        assert!(!v.rename("g"));
        assert!(!v.rename(""));
        assert!(!v.rename("x/y"));
        assert!(v.rename("c"));
        assert_eq!(ds.view(a).unwrap().name(), "c");
        assert!(ds.root().has_view("c"));
        assert!(!ds.root().has_view("a"));
        assert_eq!(ds.diagnostics().len(), 4);
    }

    #[test]
    fn test_equivalence() {
        let mut ds = DataStore::new();
        let a = ds.root_mut().create_view_and_allocate("a", TypeId::Int32, 3).unwrap();
        let g = ds.root_mut().create_group("g").unwrap();
        let b = ds
            .group_mut(g)
            .unwrap()
            .create_view_and_allocate("a", TypeId::Int32, 3)
            .unwrap();
        let c = ds
            .group_mut(g)
            .unwrap()
            .create_view_and_allocate("c", TypeId::Int32, 3)
            .unwrap();
        let va = ds.view(a).unwrap();
        assert!(va.is_equivalent_to(&ds.view(b).unwrap()));
        assert!(!va.is_equivalent_to(&ds.view(c).unwrap()));
    }
}
