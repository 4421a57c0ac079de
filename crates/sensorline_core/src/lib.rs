//! # Sensorline Core
//!
//! Crate compartilhada entre o simulador (produtor) e o monitor (consumidor)
//! da linha de sensores industriais.
//!
//! ## Módulos
//! - [`types`] – Pacote de telemetria e status de hardware
//! - [`protocol`] – Protocolo de linha JSON (pacotes e comandos)
//! - [`config`] – Configuração unificada via TOML
//! - [`signal`] – Sinal de parada com semântica de broadcast
//! - [`alerts`] – Motor de alarmes com debounce duplo
//! - [`notify`] – Destinos de notificação (log, arquivo de manutenção)

pub mod types;
pub mod protocol;
pub mod config;
pub mod signal;
pub mod alerts;
pub mod notify;

// Re-exports convenientes
pub use types::{HardwareStatus, TelemetryPacket};
pub use protocol::{Action, CommandLine, decode_packet, encode_packet};
pub use config::{AppConfig, SensorConfig};
pub use signal::StopSignal;
pub use alerts::AlarmEngine;
