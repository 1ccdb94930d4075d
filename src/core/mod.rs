//! Core domain models
//!
//! File items, build configuration, run state and the error type shared by
//! every stage of a build.

pub mod config;
pub mod error;
pub mod file;
pub mod state;

pub use config::*;
pub use error::*;
pub use file::*;
pub use state::*;
