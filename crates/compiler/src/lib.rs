//! This library implements the core of a source-to-source compiler from
//! [Solidity](https://soliditylang.org) to the
//! [Cairo](https://www.cairo-lang.org) programming language, in order to
//! enable the execution of EVM smart contracts on top of the
//! [Starknet](https://www.starknet.io) rollup L2.
//!
//! # Process Overview
//!
//! While more information can be found in the module-level documentation of
//! each part of this codebase, a brief overview of the lowering process can
//! be stated as follows:
//!
//! 1. An external front-end parses and resolves the contract source, handing
//!    us a fully-typed abstract syntax tree.
//! 2. A pipeline of AST-to-AST passes rewrites that tree, construct by
//!    construct, into an equivalent form expressible in Cairo. Where the
//!    target has no equivalent for an operation (persistent storage access
//!    being the canonical case) we instead emit a call to a generated Cairo
//!    helper function.
//! 3. The lowered tree, together with the generated helper preamble, is
//!    handed off to the external pretty-printer.
//!
//! # Language Support
//!
//! The transpiler deliberately does not aim for full language coverage.
//! Constructs outside the supported subset fail fast with an error that
//! distinguishes "not yet" from "never" (see [`stc_errors::transpile`]),
//! and output fidelity is always preferred over output size.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod cairo;
pub mod compile;
pub mod constant;
pub mod helpers;
pub mod names;
pub mod rational;
