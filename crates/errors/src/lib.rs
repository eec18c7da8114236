//! This crate contains the error types used by the Solidity-to-Cairo
//! transpiler core.
//!
//! They are defined in a separate crate so that every other crate in the
//! workspace can share one error surface without circular dependencies.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod transpile;
