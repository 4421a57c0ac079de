//! # Sensorline Monitor
//!
//! Lado consumidor: link TCP com reconexão, watchdog de conexão e o console
//! que aplica o motor de alarmes a cada pacote.

pub mod console;
pub mod input;
pub mod net_thread;
pub mod watchdog;

pub use console::{Console, GlobalStatus};
pub use input::OperatorCommand;
pub use net_thread::{LinkConfig, LinkEvent, LinkHandle};
pub use watchdog::ConnectionWatchdog;
