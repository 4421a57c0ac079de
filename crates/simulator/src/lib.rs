//! # Sensorline Simulator
//!
//! Lado produtor: sensores simulados, fila compartilhada, sinais de controle
//! e o servidor TCP que transmite a telemetria para o monitor.

pub mod control;
pub mod queue;
pub mod server;
pub mod source;

pub use control::{ControlSignals, RestartOutcome, SimContext};
pub use queue::TelemetryQueue;
pub use server::{ServerHandle, TelemetryServer};
pub use source::SensorSource;
