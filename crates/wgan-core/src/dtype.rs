use std::fmt;

// DType — element types a tensor can hold
//
// Training runs in floating point only: F32 by default, F64 when gradient
// checks need the extra precision. Comparison results are stored as 0.0/1.0
// in the dtype of their inputs.

/// Element data type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DType {
    #[default]
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Tag used by the checkpoint format.
    pub fn tag(&self) -> u8 {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
        }
    }

    /// Inverse of [`DType::tag`].
    pub fn from_tag(tag: u8) -> crate::Result<Self> {
        match tag {
            0 => Ok(DType::F32),
            1 => Ok(DType::F64),
            other => Err(crate::Error::msg(format!("unknown dtype tag: {other}"))),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for dt in [DType::F32, DType::F64] {
            assert_eq!(DType::from_tag(dt.tag()).unwrap(), dt);
        }
        assert!(DType::from_tag(9).is_err());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::default(), DType::F32);
    }
}
