//! Observability support.
//!
//! Only structured logging lives here. The bot deliberately exposes no
//! health or metrics endpoint; it is purely a client of two remote
//! services, and the process exit code is its whole operational surface.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
