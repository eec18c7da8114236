//! Useful constants for use within the transpiler.

/// The number of integer bits that fit losslessly into a single field
/// element on our target.
///
/// Integer types up to this width lower to `felt`; wider integers lower to
/// the two-limb `Uint256` structure.
pub const FELT_BITS: u16 = 251;
