//! Build execution: one engine run per build variant, scheduled by a driver

pub mod driver;
pub mod engine;

pub use driver::{clear_build_root, resolve_builds, BuildDriver, Builder, SchedulingStrategy};
pub use engine::{BuildEngine, BuildEvent, BundlerFactory, EventHandler};
