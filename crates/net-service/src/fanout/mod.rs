//! Real-time fan-out of net state changes to connected observers.

pub mod bus;
pub mod events;

pub use bus::{FanOutBus, CONNECTION_CHANNEL_BUFFER};
pub use events::{ControlMessage, NetEvent};
