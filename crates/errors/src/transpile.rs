//! Error types and utilities to do with the lowering of the Solidity AST
//! toward Cairo.

use thiserror::Error;

/// The result type for use in the transpiler.
pub type Result<T> = std::result::Result<T, Error>;

/// This error type is for use during the process of lowering the typed
/// Solidity AST to its Cairo-expressible form.
///
/// Every variant is fatal to the compilation that raises it. The pipeline
/// driver aborts on the first error and surfaces the originating variant to
/// the caller unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Emitted when an invariant expected from an earlier pass does not hold.
    ///
    /// This is always a bug in the transpiler rather than in the input. The
    /// message includes the printed description of the offending node where
    /// one exists.
    #[error("Assertion failed: {_0}")]
    AssertionFailure(String),

    /// Emitted by the rational literal engine when a rational is constructed
    /// with a zero denominator, and propagated through compile-time literal
    /// folding.
    #[error("Division by zero in compile-time arithmetic")]
    DivisionByZero,

    /// Emitted when code tries to construct an invalid ordering of compiler
    /// passes.
    #[error("Invalid Pass Ordering: {_0}")]
    InvalidPassOrdering(String),

    /// Emitted for a construct that is recognised but that the transpiler
    /// cannot lower yet. Surfaced verbatim to the user.
    #[error("Not supported yet: {_0}")]
    NotSupportedYet(String),

    /// Emitted when lowering cannot proceed on an input that is valid in the
    /// source language. Indicates a gap in the transpiler.
    #[error("Transpilation failed: {_0}")]
    TranspileFailed(String),

    /// Emitted when we encounter a type that the type translator does not
    /// know how to represent in Cairo.
    #[error("The type {_0} has no Cairo representation")]
    UnhandledType(String),

    /// Emitted for a construct that is deliberately excluded from the
    /// supported language subset. Conveys intent to the user.
    #[error("Will not support: {_0}")]
    WillNotSupport(String),
}
