//! Ports - 抽象化レイヤー
//!
//! Seams that let tests swap time, ID generation and the work itself.

pub mod clock;
pub mod id_generator;
pub mod operation;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::operation::{FnOperation, Operation, boxed};
