//! Buffers: owned, typed, contiguous blocks of element data
//!
//! A Buffer carries a type/count description and, once allocated, the
//! memory for it. Views attach to a Buffer to interpret (part of) that
//! memory. The Buffer keeps the set of attached Views so that destroying or
//! re-laying-out shared memory can be refused while anything still looks at
//! it.

use std::fmt;
use std::ptr::NonNull;

use meshstore_core::{Element, Error, IndexType, Result, TypeId};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::arena::ViewId;

const WORD: usize = std::mem::size_of::<u64>();

/// Allocated memory of a Buffer
///
/// Backed by `u64` words so the base address is 8-byte aligned and any
/// element type can be viewed in place.
struct Storage {
    words: Vec<u64>,
    len: usize,
}

impl Storage {
    fn zeroed(len: usize) -> Self {
        Storage {
            words: vec![0u64; (len + WORD - 1) / WORD],
            len,
        }
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has no
        // alignment requirement.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    #[inline]
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; the exclusive borrow of `self` covers the words.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    #[inline]
    fn ptr(&mut self) -> NonNull<u8> {
        // A Vec pointer is never null, even when empty.
        NonNull::new(self.words.as_mut_ptr().cast::<u8>()).unwrap_or(NonNull::dangling())
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("len", &self.len).finish()
    }
}

/// Reinterpret aligned bytes as elements
///
/// `bytes` must start on an address aligned for `T`. Every in-crate caller
/// derives it from 8-aligned storage at a whole-element offset.
#[inline]
pub(crate) fn cast_slice<T: Element>(bytes: &[u8]) -> &[T] {
    let size = std::mem::size_of::<T>();
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
    // SAFETY: `Element` is sealed to primitive numeric types, for which
    // every bit pattern is valid; alignment is guaranteed by the caller and
    // the length is truncated to whole elements.
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<T>(), bytes.len() / size) }
}

#[inline]
pub(crate) fn cast_slice_mut<T: Element>(bytes: &mut [u8]) -> &mut [T] {
    let size = std::mem::size_of::<T>();
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
    // SAFETY: see `cast_slice`.
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<T>(), bytes.len() / size) }
}

/// A contiguous block of typed element memory owned by a DataStore
#[derive(Debug)]
pub struct Buffer {
    index: usize,
    dtype: TypeId,
    num_elements: IndexType,
    storage: Option<Storage>,
    views: SmallVec<[ViewId; 2]>,
}

impl Buffer {
    pub(crate) fn new(index: usize) -> Self {
        Buffer {
            index,
            dtype: TypeId::NoType,
            num_elements: 0,
            storage: None,
            views: SmallVec::new(),
        }
    }

    /// Index of this buffer within its DataStore
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Described element type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.dtype
    }

    /// Described element count
    #[inline]
    pub fn num_elements(&self) -> IndexType {
        self.num_elements
    }

    /// Bytes per element of the described type
    #[inline]
    pub fn bytes_per_element(&self) -> usize {
        self.dtype.element_bytes()
    }

    /// Described size in bytes
    #[inline]
    pub fn total_bytes(&self) -> IndexType {
        self.num_elements * self.dtype.element_bytes() as IndexType
    }

    /// True once a concrete type has been set
    #[inline]
    pub fn is_described(&self) -> bool {
        self.dtype.is_valid()
    }

    /// True if memory is held
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    /// Bytes of memory actually held (0 when not allocated)
    #[inline]
    pub fn allocated_bytes(&self) -> IndexType {
        self.storage.as_ref().map_or(0, |s| s.len as IndexType)
    }

    /// Number of Views attached to this buffer
    #[inline]
    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    /// Handles of the attached Views, in attach order
    pub fn views(&self) -> &[ViewId] {
        &self.views
    }

    /// True if `view` is attached
    pub fn has_view(&self, view: ViewId) -> bool {
        self.views.contains(&view)
    }

    /// Base address of the held memory
    pub fn void_ptr(&mut self) -> Option<NonNull<u8>> {
        self.storage.as_mut().map(Storage::ptr)
    }

    /// Base address without requiring exclusive access
    pub(crate) fn base_ptr(&self) -> Option<NonNull<u8>> {
        self.storage
            .as_ref()
            .and_then(|s| NonNull::new(s.words.as_ptr().cast::<u8>().cast_mut()))
    }

    /// Held memory as raw bytes (empty when not allocated)
    pub fn bytes(&self) -> &[u8] {
        match self.storage.as_ref() {
            Some(s) => s.as_bytes(),
            None => &[],
        }
    }

    /// Held memory as mutable raw bytes (empty when not allocated)
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match self.storage.as_mut() {
            Some(s) => s.as_bytes_mut(),
            None => &mut [],
        }
    }

    /// Held memory as a typed slice
    ///
    /// Fails with `TypeMismatch` if `T` differs from the described type.
    pub fn data<T: Element>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        Ok(cast_slice(self.bytes()))
    }

    /// Held memory as a mutable typed slice
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_type::<T>()?;
        Ok(cast_slice_mut(self.bytes_mut()))
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if self.dtype != T::TYPE_ID {
            return Err(Error::TypeMismatch {
                expected: self.dtype,
                actual: T::TYPE_ID,
            });
        }
        Ok(())
    }

    /// Set the description without touching memory
    pub(crate) fn describe(&mut self, dtype: TypeId, num_elements: IndexType) -> Result<()> {
        validate_description(dtype, num_elements)?;
        self.dtype = dtype;
        self.num_elements = num_elements;
        Ok(())
    }

    /// Describe and allocate zeroed memory for `num_elements` of `dtype`
    ///
    /// Any previously held memory is released first. Refused with
    /// `BufferInUse` when Views are attached and the new layout differs
    /// from the current one.
    pub fn allocate(&mut self, dtype: TypeId, num_elements: IndexType) -> Result<()> {
        validate_description(dtype, num_elements)?;
        if !self.views.is_empty()
            && self.is_allocated()
            && (dtype != self.dtype || num_elements != self.num_elements)
        {
            return Err(Error::BufferInUse {
                buffer: self.index,
                views: self.views.len(),
            });
        }
        self.allocate_unchecked(dtype, num_elements);
        Ok(())
    }

    /// Allocate memory for the current description
    pub fn allocate_described(&mut self) -> Result<()> {
        if !self.is_described() {
            return Err(Error::NoType);
        }
        self.allocate(self.dtype, self.num_elements)
    }

    pub(crate) fn allocate_unchecked(&mut self, dtype: TypeId, num_elements: IndexType) {
        self.dtype = dtype;
        self.num_elements = num_elements;
        let len = self.total_bytes() as usize;
        self.storage = Some(Storage::zeroed(len));
        debug!(
            target: "meshstore::buffer",
            buffer = self.index,
            dtype = %dtype,
            num_elements,
            bytes = len,
            "allocated buffer"
        );
    }

    /// Resize to `num_elements`, preserving the leading
    /// `min(old_bytes, new_bytes)` bytes
    ///
    /// An unallocated but described buffer is simply allocated.
    pub fn reallocate(&mut self, num_elements: IndexType) -> Result<()> {
        if !self.is_described() {
            return Err(Error::NoType);
        }
        if num_elements < 0 {
            return Err(Error::NegativeCount {
                count: num_elements,
            });
        }
        let Some(old) = self.storage.take() else {
            self.allocate_unchecked(self.dtype, num_elements);
            return Ok(());
        };
        self.num_elements = num_elements;
        let mut fresh = Storage::zeroed(self.total_bytes() as usize);
        let keep = old.len.min(fresh.len);
        fresh.as_bytes_mut()[..keep].copy_from_slice(&old.as_bytes()[..keep]);
        debug!(
            target: "meshstore::buffer",
            buffer = self.index,
            old_bytes = old.len,
            new_bytes = fresh.len,
            "reallocated buffer"
        );
        self.storage = Some(fresh);
        Ok(())
    }

    /// Release held memory; the description is kept
    pub fn deallocate(&mut self) {
        if self.storage.take().is_some() {
            debug!(target: "meshstore::buffer", buffer = self.index, "deallocated buffer");
        }
    }

    pub(crate) fn attach(&mut self, view: ViewId) {
        if !self.views.contains(&view) {
            trace!(target: "meshstore::buffer", buffer = self.index, ?view, "attach");
            self.views.push(view);
        }
    }

    pub(crate) fn detach(&mut self, view: ViewId) {
        if let Some(pos) = self.views.iter().position(|v| *v == view) {
            trace!(target: "meshstore::buffer", buffer = self.index, ?view, "detach");
            self.views.remove(pos);
        }
    }

    /// Overwrite the held bytes; used when importing
    pub(crate) fn fill_from(&mut self, bytes: &[u8]) -> Result<()> {
        let available = self.allocated_bytes() as usize;
        if bytes.len() != available {
            return Err(Error::Import(format!(
                "buffer {} expects {} data bytes, got {}",
                self.index,
                available,
                bytes.len()
            )));
        }
        self.bytes_mut().copy_from_slice(bytes);
        Ok(())
    }
}

fn validate_description(dtype: TypeId, num_elements: IndexType) -> Result<()> {
    if !dtype.is_valid() {
        return Err(Error::NoType);
    }
    if num_elements < 0 {
        return Err(Error::NegativeCount {
            count: num_elements,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaId;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = Buffer::new(0);
        assert!(!buf.is_described());
        assert!(!buf.is_allocated());
        assert_eq!(buf.total_bytes(), 0);
        assert!(buf.bytes().is_empty());
    }

    #[test]
    fn test_allocate_zeroes_memory() {
        let mut buf = Buffer::new(0);
        buf.allocate(TypeId::Float64, 4).unwrap();
        assert_eq!(buf.total_bytes(), 32);
        assert_eq!(buf.allocated_bytes(), 32);
        assert_eq!(buf.data::<f64>().unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_allocate_rejects_notype_and_negative() {
        let mut buf = Buffer::new(0);
        assert!(matches!(buf.allocate(TypeId::NoType, 3), Err(Error::NoType)));
        assert!(matches!(
            buf.allocate(TypeId::Int32, -1),
            Err(Error::NegativeCount { count: -1 })
        ));
        assert!(!buf.is_allocated());
    }

    #[test]
    fn test_reallocate_preserves_prefix() {
        let mut buf = Buffer::new(0);
        buf.allocate(TypeId::Int32, 10).unwrap();
        for (i, v) in buf.data_mut::<i32>().unwrap().iter_mut().enumerate() {
            *v = i as i32;
        }
        buf.reallocate(5).unwrap();
        assert_eq!(buf.total_bytes(), 20);
        assert_eq!(buf.data::<i32>().unwrap(), &[0, 1, 2, 3, 4]);

        buf.reallocate(8).unwrap();
        assert_eq!(buf.data::<i32>().unwrap(), &[0, 1, 2, 3, 4, 0, 0, 0]);
    }

    #[test]
    fn test_reallocate_requires_description() {
        let mut buf = Buffer::new(0);
        assert!(matches!(buf.reallocate(4), Err(Error::NoType)));
    }

    #[test]
    fn test_typed_access_checks_type() {
        let mut buf = Buffer::new(0);
        buf.allocate(TypeId::Int32, 2).unwrap();
        let err = buf.data::<f32>().unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: TypeId::Int32,
                actual: TypeId::Float32
            }
        ));
    }

    #[test]
    fn test_allocate_with_views_and_new_layout_is_refused() {
        let mut buf = Buffer::new(2);
        buf.allocate(TypeId::Int32, 4).unwrap();
        buf.attach(ViewId::from_parts(0, 0));
        assert!(matches!(
            buf.allocate(TypeId::Int32, 8),
            Err(Error::BufferInUse { buffer: 2, views: 1 })
        ));
        // Same layout is a fresh allocation and allowed.
        buf.allocate(TypeId::Int32, 4).unwrap();
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut buf = Buffer::new(0);
        let v = ViewId::from_parts(3, 1);
        buf.attach(v);
        buf.attach(v);
        assert_eq!(buf.num_views(), 1);
        buf.detach(v);
        assert_eq!(buf.num_views(), 0);
    }

    #[test]
    fn test_deallocate_keeps_description() {
        let mut buf = Buffer::new(0);
        buf.allocate(TypeId::UInt8, 16).unwrap();
        buf.deallocate();
        assert!(!buf.is_allocated());
        assert!(buf.is_described());
        assert_eq!(buf.num_elements(), 16);
        buf.allocate_described().unwrap();
        assert_eq!(buf.allocated_bytes(), 16);
    }

    #[test]
    fn test_void_ptr_is_eight_aligned() {
        let mut buf = Buffer::new(0);
        buf.allocate(TypeId::Int8, 3).unwrap();
        let ptr = buf.void_ptr().unwrap();
        assert_eq!(ptr.as_ptr() as usize % 8, 0);
    }
}
