//! Target-language concerns: the Cairo value representations that source
//! types lower to, and the mangling of source names into identifiers that
//! are legal in Cairo.

pub mod typesystem;

pub use typesystem::{canonical_mangle, CairoType};
