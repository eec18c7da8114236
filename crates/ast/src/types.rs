//! The transpiler's structural representation of Solidity types.
//!
//! The front-end is authoritative for types: every expression node arrives
//! annotated, and the passes consult these annotations rather than
//! re-inferring anything. The [`Display`] rendering of a [`TypeNode`]
//! reproduces the source-language type string, which is what diagnostics and
//! textual type comparisons use.

use std::fmt::{Display, Formatter};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// The data location qualifier attached to reference-typed values.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum DataLocation {
    /// The value lives in persistent contract storage.
    Storage,

    /// The value lives in transient memory.
    Memory,

    /// The value is read from the call payload.
    CallData,

    /// No location qualifier applies, e.g. for value types.
    #[default]
    Default,
}

/// A representation of Solidity's [types](https://docs.soliditylang.org/en/latest/types.html)
/// for use within the transpiler.
///
/// This enum **does not** match the source type system 1:1. It restricts the
/// allowable types to the subset the transpiler lowers, and anything outside
/// that subset is rejected with `UnhandledType` at translation time rather
/// than being modelled here.
///
/// # Value Semantics
///
/// It is intended that this type is used as having value semantics. Nodes
/// carry their own copies, and comparisons clone rather than share.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TypeNode {
    /// A fixed-width integer type of up to 256 bits, signed or unsigned.
    Int {
        /// The width of the integer in bits.
        bits: u16,

        /// Whether the integer is signed.
        signed: bool,
    },

    /// The boolean type.
    Bool,

    /// The 160-bit account address type.
    Address,

    /// The dynamically-sized UTF-8 string type.
    String,

    /// The dynamically-sized byte-array type.
    Bytes,

    /// A sequential arrangement of elements of a single type.
    Array {
        /// The type of elements in the array.
        element: Box<TypeNode>,

        /// The number of elements, or [`None`] for dynamically-sized arrays.
        length: Option<usize>,
    },

    /// An associative container from a key type to a value type, persisted
    /// in contract storage.
    Mapping {
        /// The key type of the mapping.
        key: Box<TypeNode>,

        /// The value type of the mapping.
        value: Box<TypeNode>,
    },

    /// A function signature.
    Function {
        /// The parameter types of the function, matched positionally.
        inputs: Vec<TypeNode>,

        /// The return types of the function.
        outputs: Vec<TypeNode>,
    },

    /// An ordered collection of types, as produced by tuple expressions and
    /// multi-value returns.
    Tuple(Vec<TypeNode>),

    /// A reference to a value of the pointee type in the given data
    /// location.
    Pointer {
        /// The type being pointed to.
        to: Box<TypeNode>,

        /// The data location of the pointee.
        location: DataLocation,
    },

    /// A type declared by the user, referencing its declaration where the
    /// front-end resolved one.
    UserDefined {
        /// The declared name of the type.
        name: String,

        /// The id of the declaration node, if resolved.
        referenced_declaration: Option<NodeId>,
    },

    /// A built-in named type of the source language.
    Builtin(String),

    /// A built-in structure type of the source language.
    BuiltinStruct(String),
}

/// Additional utility constructors for creating the compound types without
/// having to manage boxing manually.
impl TypeNode {
    /// Builds the unsigned integer type of the provided `bits` width.
    #[must_use]
    pub fn uint(bits: u16) -> Self {
        Self::Int {
            bits,
            signed: false,
        }
    }

    /// Builds the signed integer type of the provided `bits` width.
    #[must_use]
    pub fn int(bits: u16) -> Self {
        Self::Int { bits, signed: true }
    }

    /// Builds an array type with elements of type `element` and the provided
    /// `length`, where [`None`] means dynamically sized.
    #[must_use]
    pub fn make_array(element: TypeNode, length: Option<usize>) -> Self {
        Self::Array {
            element: Box::new(element),
            length,
        }
    }

    /// Builds a mapping type from the provided `key` type to the provided
    /// `value` type.
    #[must_use]
    pub fn make_mapping(key: TypeNode, value: TypeNode) -> Self {
        Self::Mapping {
            key:   Box::new(key),
            value: Box::new(value),
        }
    }

    /// Builds a pointer to the provided pointee type in the provided data
    /// `location`.
    #[must_use]
    pub fn make_pointer(to: TypeNode, location: DataLocation) -> Self {
        Self::Pointer {
            to: Box::new(to),
            location,
        }
    }

    /// Builds a function type from the provided `inputs` and `outputs`.
    #[must_use]
    pub fn make_function(inputs: &[TypeNode], outputs: &[TypeNode]) -> Self {
        Self::Function {
            inputs:  Vec::from(inputs),
            outputs: Vec::from(outputs),
        }
    }
}

/// Operations for working with types, such as asserting properties on them,
/// or stripping qualifiers.
impl TypeNode {
    /// Strips any pointer qualifier from `self`, returning the pointee for
    /// pointers and `self` unchanged otherwise.
    #[must_use]
    pub fn strip_pointer(&self) -> &TypeNode {
        match self {
            Self::Pointer { to, .. } => to,
            other => other,
        }
    }

    /// Returns `true` if `self` is a pointer to a mapping, which is the shape
    /// that storage-mapping accesses present before lowering.
    #[must_use]
    pub fn is_mapping_pointer(&self) -> bool {
        matches!(
            self,
            Self::Pointer { to, .. } if matches!(to.as_ref(), Self::Mapping { .. })
        )
    }

    /// Returns `true` if `self` is a mapping type, looking through any
    /// pointer qualifier.
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self.strip_pointer(), Self::Mapping { .. })
    }
}

/// Renders the source-language type string, matching the strings the
/// front-end attaches to expressions.
impl Display for TypeNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeNode::Int { bits, signed } => {
                let prefix = if *signed { "int" } else { "uint" };
                write!(f, "{prefix}{bits}")
            }
            TypeNode::Bool => write!(f, "bool"),
            TypeNode::Address => write!(f, "address"),
            TypeNode::String => write!(f, "string"),
            TypeNode::Bytes => write!(f, "bytes"),
            TypeNode::Array { element, length } => match length {
                Some(len) => write!(f, "{element}[{len}]"),
                None => write!(f, "{element}[]"),
            },
            TypeNode::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            TypeNode::Function { inputs, outputs } => {
                let ins = inputs.iter().map(ToString::to_string).join(",");
                let outs = outputs.iter().map(ToString::to_string).join(",");
                if outputs.is_empty() {
                    write!(f, "function ({ins})")
                } else {
                    write!(f, "function ({ins}) returns ({outs})")
                }
            }
            TypeNode::Tuple(elements) => {
                let elems = elements.iter().map(ToString::to_string).join(",");
                write!(f, "tuple({elems})")
            }
            TypeNode::Pointer { to, location } => {
                let suffix = match location {
                    DataLocation::Storage => " storage pointer",
                    DataLocation::Memory => " memory",
                    DataLocation::CallData => " calldata",
                    DataLocation::Default => "",
                };
                write!(f, "{to}{suffix}")
            }
            TypeNode::UserDefined { name, .. }
            | TypeNode::Builtin(name)
            | TypeNode::BuiltinStruct(name) => write!(f, "{name}"),
        }
    }
}
