pub mod backoff;
pub mod manager;

pub use backoff::Backoff;
pub use manager::{ConnectionManager, ViewerHandle, FAREWELL, HANDSHAKE};
