//! Integer types and constants.
//!
//! Only two widths exist: `i1` for comparison results and branch conditions,
//! and `i32` for everything else. Values are stored as raw bits truncated to
//! the type's width; signedness is a property of the operation, not the type.

use std::fmt;

/// Fixed-width integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I1,
    I32,
}

impl Type {
    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Type::I1 => 1,
            Type::I32 => 32,
        }
    }

    /// Mask selecting the bits that belong to a value of this type.
    pub const fn mask(self) -> u32 {
        match self {
            Type::I1 => 1,
            Type::I32 => u32::MAX,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Type::I1),
            32 => Some(Type::I32),
            _ => None,
        }
    }

    /// Parse the textual spelling (`i1`, `i32`).
    pub fn from_name(name: &str) -> Option<Self> {
        name.strip_prefix('i')
            .and_then(|bits| bits.parse().ok())
            .and_then(Self::from_bits)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.bits())
    }
}

/// Integer constant of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntConst {
    ty: Type,
    bits: u32,
}

impl IntConst {
    /// Create a constant, truncating `value` to the width of `ty`.
    pub fn new(ty: Type, value: i64) -> Self {
        Self {
            ty,
            bits: (value as u32) & ty.mask(),
        }
    }

    pub fn i32(value: i32) -> Self {
        Self::new(Type::I32, value as i64)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Type::I1, value as i64)
    }

    pub fn ty(self) -> Type {
        self.ty
    }

    /// Raw bits, zero extended.
    pub fn bits(self) -> u32 {
        self.bits
    }

    /// Value interpreted as a signed 32-bit integer (`i1` yields 0 or 1).
    pub fn as_i32(self) -> i32 {
        self.bits as i32
    }
}

impl fmt::Display for IntConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::I1 => write!(f, "{}", self.bits != 0),
            Type::I32 => write!(f, "{}", self.as_i32()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Type::I32.to_string(), "i32");
        assert_eq!(Type::from_name("i1"), Some(Type::I1));
        assert_eq!(Type::from_name("i32"), Some(Type::I32));
        assert_eq!(Type::from_name("i64"), None);
        assert_eq!(Type::from_name("x32"), None);
    }

    #[test]
    fn test_constants_truncate() {
        assert_eq!(IntConst::new(Type::I1, 3).bits(), 1);
        assert_eq!(IntConst::new(Type::I1, 2).bits(), 0);
        assert_eq!(IntConst::i32(-1).bits(), u32::MAX);
        assert_eq!(IntConst::i32(-1).as_i32(), -1);
        assert_eq!(IntConst::new(Type::I32, 1 << 32).bits(), 0);
    }

    #[test]
    fn test_constant_display() {
        assert_eq!(IntConst::i32(-42).to_string(), "-42");
        assert_eq!(IntConst::bool(true).to_string(), "true");
        assert_eq!(IntConst::bool(false).to_string(), "false");
    }
}
