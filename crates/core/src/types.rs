//! Element type identifiers
//!
//! Every described region of memory in the datastore carries a `TypeId`
//! naming the primitive element stored there. The set matches the
//! fixed-width numeric types plus an 8-bit character type for strings.
//!
//! `Element` ties a Rust primitive to its `TypeId` so typed accessors can
//! check at runtime that the caller asks for the type that was described.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed index type used for element counts, offsets and strides.
///
/// Signed so that negative counts coming from callers can be detected and
/// reported instead of silently wrapping.
pub type IndexType = i64;

/// Primitive element type of a Buffer or View description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeId {
    /// No type (undescribed)
    NoType,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit IEEE float
    Float32,
    /// 64-bit IEEE float
    Float64,
    /// 8-bit character (string data)
    Char8,
}

impl TypeId {
    /// All element types except `NoType`, in declaration order
    pub const ALL: [TypeId; 11] = [
        TypeId::Int8,
        TypeId::Int16,
        TypeId::Int32,
        TypeId::Int64,
        TypeId::UInt8,
        TypeId::UInt16,
        TypeId::UInt32,
        TypeId::UInt64,
        TypeId::Float32,
        TypeId::Float64,
        TypeId::Char8,
    ];

    /// Size of one element in bytes (0 for `NoType`)
    pub const fn element_bytes(self) -> usize {
        match self {
            TypeId::NoType => 0,
            TypeId::Int8 | TypeId::UInt8 | TypeId::Char8 => 1,
            TypeId::Int16 | TypeId::UInt16 => 2,
            TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 => 4,
            TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 => 8,
        }
    }

    /// Stable lowercase name, used in exported documents
    pub const fn name(self) -> &'static str {
        match self {
            TypeId::NoType => "notype",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::UInt8 => "uint8",
            TypeId::UInt16 => "uint16",
            TypeId::UInt32 => "uint32",
            TypeId::UInt64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Char8 => "char8",
        }
    }

    /// Parse a name produced by [`TypeId::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "notype" {
            return Some(TypeId::NoType);
        }
        TypeId::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// True for every type except `NoType`
    pub const fn is_valid(self) -> bool {
        !matches!(self, TypeId::NoType)
    }

    /// True for floating point types
    pub const fn is_float(self) -> bool {
        matches!(self, TypeId::Float32 | TypeId::Float64)
    }

    /// True for signed integer types
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64
        )
    }
}

impl Default for TypeId {
    fn default() -> Self {
        TypeId::NoType
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A primitive numeric type that may be stored in a Buffer or scalar View
///
/// Sealed: every implementor is plain old data for which any bit pattern is
/// a valid value, which is what lets the datastore hand out typed slices
/// over raw buffer memory.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// The type id describing this element type
    const TYPE_ID: TypeId;

    /// Write the native-endian bytes of `self` into the front of `out`
    fn write_ne(self, out: &mut [u8]);

    /// Read a value from the front of `bytes` (native endian)
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $id:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const TYPE_ID: TypeId = TypeId::$id;

                #[inline]
                fn write_ne(self, out: &mut [u8]) {
                    const N: usize = std::mem::size_of::<$ty>();
                    out[..N].copy_from_slice(&self.to_ne_bytes());
                }

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    const N: usize = std::mem::size_of::<$ty>();
                    let mut raw = [0u8; N];
                    raw.copy_from_slice(&bytes[..N]);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_bytes() {
        assert_eq!(TypeId::NoType.element_bytes(), 0);
        assert_eq!(TypeId::Int8.element_bytes(), 1);
        assert_eq!(TypeId::Char8.element_bytes(), 1);
        assert_eq!(TypeId::UInt16.element_bytes(), 2);
        assert_eq!(TypeId::Int32.element_bytes(), 4);
        assert_eq!(TypeId::Float32.element_bytes(), 4);
        assert_eq!(TypeId::Float64.element_bytes(), 8);
    }

    #[test]
    fn test_name_round_trip() {
        for t in TypeId::ALL {
            assert_eq!(TypeId::from_name(t.name()), Some(t));
        }
        assert_eq!(TypeId::from_name("notype"), Some(TypeId::NoType));
        assert_eq!(TypeId::from_name("complex128"), None);
    }

    #[test]
    fn test_element_type_ids() {
        assert_eq!(<i32 as Element>::TYPE_ID, TypeId::Int32);
        assert_eq!(<u64 as Element>::TYPE_ID, TypeId::UInt64);
        assert_eq!(<f64 as Element>::TYPE_ID, TypeId::Float64);
        assert_eq!(
            std::mem::size_of::<f32>(),
            <f32 as Element>::TYPE_ID.element_bytes()
        );
    }

    #[test]
    fn test_element_native_bytes() {
        let mut out = [0u8; 8];
        (-7i16).write_ne(&mut out);
        assert_eq!(i16::read_ne(&out), -7);

        2.5f64.write_ne(&mut out);
        assert_eq!(f64::read_ne(&out), 2.5);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&TypeId::Float64).unwrap();
        assert_eq!(json, "\"float64\"");
        let back: TypeId = serde_json::from_str("\"uint8\"").unwrap();
        assert_eq!(back, TypeId::UInt8);
    }
}
