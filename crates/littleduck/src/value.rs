//! Runtime values and the primitive type system.
//!
//! LittleDuck has four primitive types. All values are immediate: a memory
//! slot owns its value outright and copies on assignment, so there is no
//! heap and no reference counting.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// The primitive types of the language.
///
/// Variant order is significant: it matches the fixed type-tag contract
/// (`int→0, bool→1, float→2, string→3`) used by the code generator when
/// sorting constants and partitioning memory scopes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Int,
    Bool,
    Float,
    String,
}

impl ValueType {
    /// The numeric tag used in the IR wire format.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Int => 0,
            Self::Bool => 1,
            Self::Float => 2,
            Self::String => 3,
        }
    }

    /// Reverses [`ValueType::tag`]. Returns `None` for tags outside `0..=3`.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Int),
            1 => Some(Self::Bool),
            2 => Some(Self::Float),
            3 => Some(Self::String),
            _ => None,
        }
    }
}

/// A runtime value held in a virtual-machine memory slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Float(f64),
    Str(String),
}

impl Value {
    /// The static type this value belongs to.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Bool(_) => ValueType::Bool,
            Self::Float(_) => ValueType::Float,
            Self::Str(_) => ValueType::String,
        }
    }

    /// Truthiness as used by the logical operators and conditional jumps.
    ///
    /// Ints are truthy when nonzero, mirroring the semantic cube's "int
    /// treated as truthy" rule for `&&`/`||`.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Bool(b) => *b,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    /// Numeric view of the value, promoting ints and bools to `f64`.
    ///
    /// Returns `None` for strings.
    #[must_use]
    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }
}

/// `Display` renders the value the way `print` writes it: ints in decimal,
/// floats in shortest round-trip form (`15.0` keeps its `.0`), bools as the
/// language literals, strings verbatim without quotes.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(value) => {
                if value.is_finite() {
                    let mut buffer = ryu::Buffer::new();
                    f.write_str(buffer.format_finite(*value))
                } else {
                    write!(f, "{value}")
                }
            }
            Self::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_match_the_wire_contract() {
        assert_eq!(ValueType::Int.tag(), 0);
        assert_eq!(ValueType::Bool.tag(), 1);
        assert_eq!(ValueType::Float.tag(), 2);
        assert_eq!(ValueType::String.tag(), 3);
        for tag in 0..4 {
            assert_eq!(ValueType::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(ValueType::from_tag(4), None);
    }

    #[test]
    fn float_display_keeps_fraction() {
        assert_eq!(Value::Float(15.0).to_string(), "15.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(-3).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
    }
}
