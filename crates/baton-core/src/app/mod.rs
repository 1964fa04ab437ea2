//! App - wiring of the queue and the lock service.

pub mod builder;

pub use self::builder::{App, AppBuilder, BuildError};
