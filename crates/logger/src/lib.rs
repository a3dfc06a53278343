//! Tracing setup shared by the gatecheck binaries.

mod tracing;

pub use self::tracing::init_with_level;
