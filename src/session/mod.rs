//! Session lifecycle: the two outbound connections and their supervisor.
//!
//! Both sessions are created exactly once at startup and never recreated.
//! The MQTT event loop runs on a supervised background task; the IRC event
//! loop runs on the main task inside the supervisor.

pub mod irc;
pub mod mqtt;
pub mod supervisor;

pub use supervisor::Supervisor;
