//! Tipos de telemetria trafegados entre simulador e monitor.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Status de hardware anexado a cada leitura.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HardwareStatus {
    #[default]
    Ok,
    Faulty,
}

impl HardwareStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HardwareStatus::Ok => "OK",
            HardwareStatus::Faulty => "FAULTY",
        }
    }

    pub fn is_faulty(self) -> bool {
        self == HardwareStatus::Faulty
    }
}

impl fmt::Display for HardwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uma leitura de sensor, exatamente como vai no fio.
///
/// Campos: `{id, sensor, value, timestamp, status}`. O timestamp é Unix em
/// segundos (fração incluída).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    pub id: u32,
    pub sensor: String,
    pub value: f64,
    pub timestamp: f64,
    pub status: HardwareStatus,
}

impl TelemetryPacket {
    /// Cria um pacote carimbado com o relógio atual.
    pub fn new(id: u32, sensor: impl Into<String>, value: f64, status: HardwareStatus) -> Self {
        Self {
            id,
            sensor: sensor.into(),
            value,
            timestamp: unix_now(),
            status,
        }
    }

    /// Pacote de falha fixa emitido quando o sensor fica sem dados.
    pub fn fault(id: u32, sensor: impl Into<String>) -> Self {
        Self::new(id, sensor, 0.0, HardwareStatus::Faulty)
    }
}

/// Segundos desde a época Unix.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Formata um timestamp Unix como `HH:MM:SS` no fuso local.
pub fn format_clock(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    match DateTime::from_timestamp(secs as i64, nanos) {
        Some(utc) => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".into(),
    }
}
