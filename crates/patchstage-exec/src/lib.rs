//! Command execution layer for patchstage.
//!
//! This crate defines the [`CommandRunner`] trait, the single interface
//! through which the staging controller runs external version-control
//! commands. The controller never spawns processes itself; it builds
//! [`CommandSpec`]s and hands them to a runner.
//!
//! # Crate layout
//!
//! - [`command`] — [`CommandSpec`] (what to run) and [`CommandOutput`]
//!   (what came back).
//! - [`runner`] — the [`CommandRunner`] trait and the [`ProcessRunner`]
//!   implementation backed by `std::process`.
//! - [`error`] — the [`ExecError`] enum returned by every runner.
//!
//! # Batches
//!
//! [`CommandRunner::run_batch`] executes commands strictly in order against
//! one working directory. The first failure stops the batch and is returned
//! unchanged; later commands are never started.

pub mod command;
pub mod error;
pub mod runner;

pub use command::{CommandOutput, CommandSpec};
pub use error::ExecError;
pub use runner::{CommandRunner, ProcessRunner};
