//! Data layout descriptions
//!
//! A `Schema` describes how to interpret a region of memory: element type,
//! element count, and the byte offset/stride of the elements. Offsets and
//! strides are kept in bytes so imported descriptions can be represented
//! exactly; accessors that speak in elements validate divisibility.

use crate::error::{Error, Result};
use crate::types::{IndexType, TypeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Per-dimension extents of a described View
pub type Shape = SmallVec<[IndexType; 4]>;

/// Type/count/offset/stride description of a data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Element type
    pub dtype: TypeId,
    /// Number of elements
    pub num_elements: IndexType,
    /// Offset of the first element, in bytes
    #[serde(default)]
    pub offset: IndexType,
    /// Distance between consecutive elements, in bytes
    pub stride: IndexType,
}

impl Schema {
    /// Compact description of `num_elements` elements of `dtype`
    pub fn new(dtype: TypeId, num_elements: IndexType) -> Self {
        Schema {
            dtype,
            num_elements,
            offset: 0,
            stride: dtype.element_bytes() as IndexType,
        }
    }

    /// Description with an element offset and stride, given in elements
    pub fn with_layout(
        dtype: TypeId,
        num_elements: IndexType,
        offset_elems: IndexType,
        stride_elems: IndexType,
    ) -> Self {
        let bytes = dtype.element_bytes() as IndexType;
        Schema {
            dtype,
            num_elements,
            offset: offset_elems * bytes,
            stride: stride_elems * bytes,
        }
    }

    /// Bytes per element
    #[inline]
    pub fn element_bytes(&self) -> usize {
        self.dtype.element_bytes()
    }

    /// Bytes occupied by the elements themselves (`num_elements * element_bytes`)
    #[inline]
    pub fn total_bytes(&self) -> IndexType {
        self.num_elements * self.element_bytes() as IndexType
    }

    /// Bytes of backing memory needed to reach the last element
    ///
    /// `offset + stride * (n - 1) + element_bytes`, or 0 for an empty region.
    pub fn spanned_bytes(&self) -> IndexType {
        if self.num_elements <= 0 {
            return 0;
        }
        self.offset + self.stride * (self.num_elements - 1) + self.element_bytes() as IndexType
    }

    /// True if elements are packed with no gaps
    #[inline]
    pub fn is_compact(&self) -> bool {
        self.stride == self.element_bytes() as IndexType
    }

    /// Offset in elements
    ///
    /// Fails with `NonIntegralLayout` if the byte offset is not a multiple of
    /// the element size.
    pub fn offset_elements(&self, path: &str) -> Result<IndexType> {
        self.in_elements(path, "offset", self.offset)
    }

    /// Stride in elements
    pub fn stride_elements(&self, path: &str) -> Result<IndexType> {
        self.in_elements(path, "stride", self.stride)
    }

    fn in_elements(&self, path: &str, what: &'static str, bytes: IndexType) -> Result<IndexType> {
        let elem = self.element_bytes() as IndexType;
        if elem == 0 {
            return Ok(bytes);
        }
        if bytes % elem != 0 {
            return Err(Error::NonIntegralLayout {
                path: path.to_string(),
                what,
                bytes,
                element_bytes: elem as usize,
            });
        }
        Ok(bytes / elem)
    }
}

/// Number of elements described by a shape (product of extents)
pub fn shape_num_elements(shape: &[IndexType]) -> IndexType {
    if shape.is_empty() {
        return 0;
    }
    shape.iter().product()
}
