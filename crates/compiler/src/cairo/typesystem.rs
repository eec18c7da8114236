//! The transpiler's representation of Cairo value types, and the translation
//! from source types into them.
//!
//! Cairo has exactly one native value type, the field element, so the
//! interesting question for every source type is whether it fits a single
//! `felt`, needs the two-limb `Uint256` structure, or is referred to through
//! a pointer. The translation is a total function over the supported subset;
//! anything outside it fails with `UnhandledType` rather than guessing.

use std::fmt::{Display, Formatter};

use stc_ast::types::TypeNode;
use stc_errors::transpile::{Error, Result};

use crate::constant::FELT_BITS;

/// A representation of Cairo's value types for use within the transpiler.
///
/// # Value Semantics
///
/// It is intended that this type is used as having value semantics, and not
/// ever have a reference returned to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CairoType {
    /// The native single-limb field-element type.
    Felt,

    /// The 256-bit integer structure, represented as a pair of
    /// field-element limbs `(low, high)`.
    Uint256,

    /// A pointer to a value of the pointee type.
    Pointer(Box<CairoType>),

    /// A named Cairo type, produced by [`canonical_mangle`] from
    /// user-defined and built-in source type names.
    Named(String),

    /// A mapping description. This is never a value representation; it
    /// exists only so diagnostics can render the shape of a mapping whose
    /// accesses are lowered through helpers.
    Mapping {
        /// The source-language key type string.
        key: String,

        /// The translated value representation.
        value: Box<CairoType>,
    },
}

impl CairoType {
    /// Translates the provided source type into its Cairo value
    /// representation.
    ///
    /// Pointer qualifiers are erased: a pointer to a value is represented
    /// the same way as the value itself, because data location is a
    /// source-language notion that the lowered form expresses through
    /// helper calls instead.
    ///
    /// # Errors
    ///
    /// - [`Error::UnhandledType`] for any type outside the supported
    ///   subset.
    pub fn from_type_node(ty: &TypeNode) -> Result<Self> {
        let result = match ty {
            TypeNode::Int { bits, .. } => {
                if *bits <= FELT_BITS {
                    Self::Felt
                } else {
                    Self::Uint256
                }
            }
            TypeNode::Bool | TypeNode::Address | TypeNode::String => Self::Felt,
            TypeNode::Bytes => Self::Pointer(Box::new(Self::Felt)),
            TypeNode::Array { element, .. } => {
                Self::Pointer(Box::new(Self::from_type_node(element)?))
            }
            TypeNode::Mapping { key, value } => Self::Mapping {
                key:   key.to_string(),
                value: Box::new(Self::from_type_node(value)?),
            },
            TypeNode::Function { .. } => Self::Pointer(Box::new(Self::Felt)),
            TypeNode::Pointer { to, .. } => Self::from_type_node(to)?,
            TypeNode::UserDefined { name, .. } => Self::Named(canonical_mangle(name)),
            TypeNode::Builtin(name) | TypeNode::BuiltinStruct(name) => {
                Self::Named(canonical_mangle(name))
            }
            TypeNode::Tuple(_) => Err(Error::UnhandledType(ty.to_string()))?,
        };

        Ok(result)
    }

    /// Gets the number of storage cells a value of this representation
    /// occupies: one per felt limb.
    #[must_use]
    pub fn width_in_cells(&self) -> usize {
        match self {
            CairoType::Uint256 => 2,
            _ => 1,
        }
    }
}

/// This matches the spellings used by Cairo source, with pointers rendered
/// in the Cairo `<pointee>*` style.
impl Display for CairoType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CairoType::Felt => write!(f, "felt"),
            CairoType::Uint256 => write!(f, "Uint256"),
            CairoType::Pointer(pointee) => write!(f, "{pointee}*"),
            CairoType::Named(name) => write!(f, "{name}"),
            CairoType::Mapping { key, value } => write!(f, "{key} => {value}"),
        }
    }
}

/// Rewrites the provided source-language name into one that is legal as a
/// Cairo identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes an underscore. The
/// rewriting is deterministic and total; it is _not_ injective over
/// arbitrary strings, so callers that require distinctness (the helper
/// registry) must check for collisions rather than assume them away.
#[must_use]
pub fn canonical_mangle(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
