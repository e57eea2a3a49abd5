//! Listener container: broker session ownership and subscription lifecycle

mod listener;
mod state;

pub use listener::{ContainerConfig, FrameHandler, ListenerContainer};
pub use state::ContainerState;
