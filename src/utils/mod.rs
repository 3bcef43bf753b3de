//! Shared utilities.

pub mod bootstrap;
pub mod clock;
pub mod relative_time;

pub use clock::VersionClock;
pub use relative_time::relative_time;
