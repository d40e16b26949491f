pub mod buffer;
pub mod error;
pub mod gauge;
pub mod sample;
pub mod state;

pub use buffer::{DisplayBuffer, DISPLAY_CAPACITY};
pub use error::{DecodeError, Result, ViewerError};
pub use gauge::GaugeLine;
pub use sample::{decode, Sample};
pub use state::{ConnectionState, LifecycleEvent};
