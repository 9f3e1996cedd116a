//! Relaying detected links to the broker.

pub mod publisher;
pub mod topics;

pub use publisher::{LinkEvent, LinkPublisher};
