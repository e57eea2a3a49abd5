//! Inbound channel adapter and its construction API

mod builder;
mod group;
mod inbound;

pub use builder::AdapterBuilder;
pub use group::AdapterGroup;
pub use inbound::{FaultKind, InboundChannelAdapter};
