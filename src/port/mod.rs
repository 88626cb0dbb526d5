//! Transport abstraction layer.
//!
//! Provides the `Transport` trait the buffering engine drains, a real serial
//! port implementation and a mock for tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockTransport;
pub use sync_port::*;
pub use traits::*;
