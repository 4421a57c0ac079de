//! Motor de alarmes – classificação por pacote e debounce de notificações.
//!
//! Cada sensor tem duas estratégias independentes:
//!
//! - **Leaky bucket** (processo): +1 a cada violação de limite, −1 a cada
//!   leitura nominal (piso 0). Notifica uma única vez ao atingir o limiar; só
//!   rearma quando o balde esvazia por completo.
//! - **Contador cumulativo** (hardware): +1 a cada `FAULTY`, nunca decai.
//!   Ao atingir o limiar notifica manutenção e zera o contador.
//!
//! O log de alarmes é disparado por borda (OK → ALARM) e não depende de
//! nenhum dos dois contadores.

use crate::config::{AlarmConfig, SensorConfig};
use crate::types::{HardwareStatus, TelemetryPacket};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Classificação do valor contra os limites do sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Ok,
    Low,
    High,
}

impl ProcessStatus {
    /// Comparação estrita: o valor exatamente no limite é nominal.
    pub fn classify(value: f64, low: f64, high: f64) -> Self {
        if value > high {
            ProcessStatus::High
        } else if value < low {
            ProcessStatus::Low
        } else {
            ProcessStatus::Ok
        }
    }

    pub fn is_ok(self) -> bool {
        self == ProcessStatus::Ok
    }
}

/// Estado composto anterior de um sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlarmState {
    #[default]
    Ok,
    Alarm,
}

/// Severidade para exibição. Falha de hardware supera alarme de processo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Nominal,
    ProcessAlarm,
    HardwareFault,
}

impl Severity {
    pub fn of(hardware: HardwareStatus, process: ProcessStatus) -> Self {
        if hardware.is_faulty() {
            Severity::HardwareFault
        } else if !process.is_ok() {
            Severity::ProcessAlarm
        } else {
            Severity::Nominal
        }
    }
}

/// Motivo registrado no log de alarmes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    HardwareFault,
    HighLimit,
    LowLimit,
}

impl AlarmKind {
    pub fn label(self) -> &'static str {
        match self {
            AlarmKind::HardwareFault => "Hardware Fault",
            AlarmKind::HighLimit => "High Limit Exceeded",
            AlarmKind::LowLimit => "Low Limit Exceeded",
        }
    }
}

/// Entrada do log de alarmes (uma por episódio).
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmLogEvent {
    pub sensor: String,
    pub value: f64,
    pub kind: AlarmKind,
    pub timestamp: f64,
}

/// Tipo da notificação: `"process"` ou `"hardware"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Process,
    Hardware,
}

/// Intenção de notificação. A entrega fica a cargo de um
/// [`NotificationSink`](crate::notify::NotificationSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub sensor: String,
    pub value: f64,
    pub severity: NotificationKind,
    pub message: String,
}

/// Estado de debounce de um sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorAlarmState {
    pub previous: AlarmState,
    pub process_bucket: u32,
    pub process_notified: bool,
    pub hardware_faults: u32,
    pub hardware_notified: bool,
}

/// Resultado do processamento de um pacote.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub process: ProcessStatus,
    pub severity: Severity,
    pub alarm_log: Option<AlarmLogEvent>,
    pub notification: Option<Notification>,
}

impl Evaluation {
    pub fn is_alarm(&self) -> bool {
        self.severity != Severity::Nominal
    }
}

#[derive(Debug)]
struct TrackedSensor {
    low: f64,
    high: f64,
    state: SensorAlarmState,
}

/// Motor de alarmes. Possui o estado de todos os sensores e deve ser mutado
/// por uma única thread lógica.
#[derive(Debug)]
pub struct AlarmEngine {
    thresholds: AlarmConfig,
    sensors: HashMap<String, TrackedSensor>,
}

impl AlarmEngine {
    pub fn new(sensors: &[SensorConfig], thresholds: AlarmConfig) -> Self {
        let sensors = sensors
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    TrackedSensor {
                        low: s.low,
                        high: s.high,
                        state: SensorAlarmState::default(),
                    },
                )
            })
            .collect();
        Self {
            thresholds,
            sensors,
        }
    }

    /// Processa um pacote. Sensor desconhecido é descartado sem mutação.
    pub fn process(&mut self, packet: &TelemetryPacket) -> Option<Evaluation> {
        let Some(tracked) = self.sensors.get_mut(&packet.sensor) else {
            warn!("Pacote de sensor desconhecido descartado: {}", packet.sensor);
            return None;
        };
        let thresholds = self.thresholds;
        let state = &mut tracked.state;

        // 1–2. Classificação e flag composta
        let process = ProcessStatus::classify(packet.value, tracked.low, tracked.high);
        let hardware = packet.status;
        let alarmed = hardware.is_faulty() || !process.is_ok();

        // 3. Log por borda
        let alarm_log = if alarmed {
            if state.previous == AlarmState::Ok {
                state.previous = AlarmState::Alarm;
                let kind = match (hardware, process) {
                    (HardwareStatus::Faulty, _) => AlarmKind::HardwareFault,
                    (_, ProcessStatus::High) => AlarmKind::HighLimit,
                    _ => AlarmKind::LowLimit,
                };
                info!("ALARME {}: {} (valor {})", packet.sensor, kind.label(), packet.value);
                Some(AlarmLogEvent {
                    sensor: packet.sensor.clone(),
                    value: packet.value,
                    kind,
                    timestamp: packet.timestamp,
                })
            } else {
                None
            }
        } else {
            state.previous = AlarmState::Ok;
            None
        };

        // 4. Leaky bucket de processo
        let mut process_due = false;
        if !process.is_ok() {
            state.process_bucket = state.process_bucket.saturating_add(1);
            process_due = state.process_bucket >= thresholds.process_bucket_threshold
                && !state.process_notified;
        } else {
            state.process_bucket = state.process_bucket.saturating_sub(1);
            if state.process_bucket == 0 {
                state.process_notified = false;
            }
        }

        // 5. Contador cumulativo de hardware
        let mut hardware_due = false;
        if hardware.is_faulty() {
            state.hardware_faults = state.hardware_faults.saturating_add(1);
            hardware_due = state.hardware_faults >= thresholds.hardware_fault_threshold
                && !state.hardware_notified;
        }

        // No máximo uma notificação por pacote; hardware tem precedência e a
        // de processo fica para o próximo pacote em violação.
        let notification = if hardware_due {
            let faults = state.hardware_faults;
            state.hardware_notified = true;
            state.hardware_faults = 0;
            if process_due {
                debug!("{}: notificação de processo adiada pela de hardware", packet.sensor);
            }
            Some(Notification {
                sensor: packet.sensor.clone(),
                value: packet.value,
                severity: NotificationKind::Hardware,
                message: format!(
                    "{}: {} falhas de hardware acumuladas – manutenção necessária",
                    packet.sensor, faults
                ),
            })
        } else if process_due {
            state.process_notified = true;
            let kind = if process == ProcessStatus::High {
                AlarmKind::HighLimit
            } else {
                AlarmKind::LowLimit
            };
            Some(Notification {
                sensor: packet.sensor.clone(),
                value: packet.value,
                severity: NotificationKind::Process,
                message: format!(
                    "{}: {} persistente ({} violações, valor {})",
                    packet.sensor,
                    kind.label(),
                    state.process_bucket,
                    packet.value
                ),
            })
        } else {
            None
        };

        Some(Evaluation {
            process,
            severity: Severity::of(hardware, process),
            alarm_log,
            notification,
        })
    }

    /// Zera o estado de todos os sensores (comando de restart).
    pub fn reset(&mut self) {
        for tracked in self.sensors.values_mut() {
            tracked.state = SensorAlarmState::default();
        }
        info!("Estado de alarmes zerado ({} sensores)", self.sensors.len());
    }

    pub fn state(&self, sensor: &str) -> Option<&SensorAlarmState> {
        self.sensors.get(sensor).map(|t| &t.state)
    }

    /// Algum sensor está em alarme?
    pub fn any_alarm(&self) -> bool {
        self.sensors
            .values()
            .any(|t| t.state.previous == AlarmState::Alarm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AlarmEngine {
        let sensors = [
            SensorConfig::new(100, "temp1", 20.0, 80.0, 0.5),
            SensorConfig::new(102, "press", 12.0, 45.0, 0.5),
            SensorConfig::new(104, "vib", 0.1, 4.0, 0.5),
        ];
        AlarmEngine::new(&sensors, AlarmConfig::default())
    }

    fn packet(sensor: &str, value: f64, status: HardwareStatus) -> TelemetryPacket {
        TelemetryPacket {
            id: 1,
            sensor: sensor.into(),
            value,
            timestamp: 1_700_000_000.0,
            status,
        }
    }

    fn ok(sensor: &str, value: f64) -> TelemetryPacket {
        packet(sensor, value, HardwareStatus::Ok)
    }

    fn faulty(sensor: &str, value: f64) -> TelemetryPacket {
        packet(sensor, value, HardwareStatus::Faulty)
    }

    fn state_mut<'a>(engine: &'a mut AlarmEngine, sensor: &str) -> &'a mut SensorAlarmState {
        &mut engine.sensors.get_mut(sensor).unwrap().state
    }

    #[test]
    fn limits_are_inclusive() {
        assert_eq!(ProcessStatus::classify(80.0, 20.0, 80.0), ProcessStatus::Ok);
        assert_eq!(ProcessStatus::classify(20.0, 20.0, 80.0), ProcessStatus::Ok);
        assert_eq!(ProcessStatus::classify(80.1, 20.0, 80.0), ProcessStatus::High);
        assert_eq!(ProcessStatus::classify(19.9, 20.0, 80.0), ProcessStatus::Low);
        assert_eq!(
            ProcessStatus::classify(80.0 + f64::EPSILON * 128.0, 20.0, 80.0),
            ProcessStatus::High
        );
    }

    #[test]
    fn faulty_always_alarms() {
        let mut e = engine();
        let eval = e.process(&faulty("temp1", 50.0)).unwrap();
        assert!(eval.process.is_ok());
        assert!(eval.is_alarm());
        assert_eq!(eval.severity, Severity::HardwareFault);
        assert_eq!(eval.alarm_log.unwrap().kind, AlarmKind::HardwareFault);
    }

    #[test]
    fn hardware_outranks_process() {
        let mut e = engine();
        let eval = e.process(&faulty("temp1", 99.9)).unwrap();
        assert_eq!(eval.process, ProcessStatus::High);
        assert_eq!(eval.severity, Severity::HardwareFault);
        assert!(Severity::HardwareFault > Severity::ProcessAlarm);
        assert!(Severity::ProcessAlarm > Severity::Nominal);
    }

    #[test]
    fn alarm_log_is_edge_triggered() {
        let mut e = engine();
        let sequence = [50.0, 50.0, 99.0, 99.0, 99.0, 50.0];
        let logs: Vec<_> = sequence
            .iter()
            .map(|&v| e.process(&ok("temp1", v)).unwrap().alarm_log)
            .collect();
        let fired: Vec<_> = logs.iter().enumerate().filter(|(_, l)| l.is_some()).collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 2);
        assert_eq!(e.state("temp1").unwrap().previous, AlarmState::Ok);
    }

    #[test]
    fn new_episode_logs_again() {
        let mut e = engine();
        assert!(e.process(&ok("temp1", 10.0)).unwrap().alarm_log.is_some());
        assert!(e.process(&ok("temp1", 50.0)).unwrap().alarm_log.is_none());
        let again = e.process(&ok("temp1", 10.0)).unwrap().alarm_log.unwrap();
        assert_eq!(again.kind, AlarmKind::LowLimit);
    }

    #[test]
    fn leaky_bucket_notifies_on_fifth_violation() {
        let mut e = engine();
        for _ in 0..4 {
            let eval = e.process(&ok("temp1", 99.9)).unwrap();
            assert!(eval.notification.is_none());
        }
        assert!(!e.state("temp1").unwrap().process_notified);

        let eval = e.process(&ok("temp1", 99.9)).unwrap();
        let n = eval.notification.unwrap();
        assert_eq!(n.severity, NotificationKind::Process);
        assert_eq!(n.sensor, "temp1");
        assert!(e.state("temp1").unwrap().process_notified);
    }

    #[test]
    fn leaky_bucket_fires_once_per_escalation() {
        let mut e = engine();
        let fired = (0..20)
            .filter(|_| e.process(&ok("temp1", 99.9)).unwrap().notification.is_some())
            .count();
        assert_eq!(fired, 1);
        assert_eq!(e.state("temp1").unwrap().process_bucket, 20);
    }

    #[test]
    fn leaky_bucket_leaks_on_healthy_data() {
        let mut e = engine();
        state_mut(&mut e, "press").process_bucket = 3;
        e.process(&ok("press", 20.0)).unwrap();
        assert_eq!(e.state("press").unwrap().process_bucket, 2);
    }

    #[test]
    fn leaky_bucket_never_goes_negative() {
        let mut e = engine();
        for _ in 0..3 {
            e.process(&ok("press", 20.0)).unwrap();
        }
        assert_eq!(e.state("press").unwrap().process_bucket, 0);
    }

    #[test]
    fn latch_rearms_only_when_bucket_empties() {
        let mut e = engine();
        for _ in 0..5 {
            e.process(&ok("press", 50.0)).unwrap();
        }
        assert!(e.state("press").unwrap().process_notified);

        // Vaza até 1: ainda travado, nova escalada não notifica
        for _ in 0..4 {
            e.process(&ok("press", 20.0)).unwrap();
        }
        assert_eq!(e.state("press").unwrap().process_bucket, 1);
        assert!(e.state("press").unwrap().process_notified);
        for _ in 0..6 {
            assert!(e.process(&ok("press", 50.0)).unwrap().notification.is_none());
        }

        // Esvazia por completo: rearma
        for _ in 0..7 {
            e.process(&ok("press", 20.0)).unwrap();
        }
        assert_eq!(e.state("press").unwrap().process_bucket, 0);
        assert!(!e.state("press").unwrap().process_notified);
        let fired = (0..5)
            .filter(|_| e.process(&ok("press", 50.0)).unwrap().notification.is_some())
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn hardware_counter_does_not_decay() {
        let mut e = engine();
        e.process(&faulty("vib", 1.0)).unwrap();
        assert_eq!(e.state("vib").unwrap().hardware_faults, 1);
        e.process(&ok("vib", 1.0)).unwrap();
        assert_eq!(e.state("vib").unwrap().hardware_faults, 1);
    }

    #[test]
    fn hardware_threshold_fires_and_resets() {
        let mut e = engine();
        state_mut(&mut e, "vib").hardware_faults = 14;
        let eval = e.process(&faulty("vib", 2.0)).unwrap();
        let n = eval.notification.unwrap();
        assert_eq!(n.severity, NotificationKind::Hardware);
        let state = e.state("vib").unwrap();
        assert!(state.hardware_notified);
        assert_eq!(state.hardware_faults, 0);
    }

    #[test]
    fn hardware_latch_holds_until_reset() {
        let mut e = engine();
        state_mut(&mut e, "vib").hardware_faults = 14;
        assert!(e.process(&faulty("vib", 2.0)).unwrap().notification.is_some());
        for _ in 0..20 {
            assert!(e.process(&faulty("vib", 2.0)).unwrap().notification.is_none());
        }
        assert_eq!(e.state("vib").unwrap().hardware_faults, 20);

        e.reset();
        state_mut(&mut e, "vib").hardware_faults = 14;
        assert!(e.process(&faulty("vib", 2.0)).unwrap().notification.is_some());
    }

    #[test]
    fn latched_counters_saturate() {
        let mut e = engine();
        {
            let s = state_mut(&mut e, "press");
            s.process_bucket = u32::MAX;
            s.process_notified = true;
            s.hardware_faults = u32::MAX;
            s.hardware_notified = true;
        }
        let eval = e.process(&faulty("press", 99.0)).unwrap();
        assert!(eval.notification.is_none());
        let state = e.state("press").unwrap();
        assert_eq!(state.process_bucket, u32::MAX);
        assert_eq!(state.hardware_faults, u32::MAX);
    }

    #[test]
    fn one_notification_per_packet_hardware_first() {
        let mut e = engine();
        {
            let s = state_mut(&mut e, "temp1");
            s.process_bucket = 4;
            s.hardware_faults = 14;
        }
        let eval = e.process(&faulty("temp1", 99.9)).unwrap();
        assert_eq!(eval.notification.unwrap().severity, NotificationKind::Hardware);
        assert!(!e.state("temp1").unwrap().process_notified);

        // A de processo sai no pacote seguinte ainda em violação
        let eval = e.process(&ok("temp1", 99.9)).unwrap();
        assert_eq!(eval.notification.unwrap().severity, NotificationKind::Process);
    }

    #[test]
    fn unknown_sensor_is_dropped() {
        let mut e = engine();
        assert!(e.process(&faulty("ghost", 1.0)).is_none());
        assert!(e.state("ghost").is_none());
        assert!(!e.any_alarm());
    }

    #[test]
    fn reset_clears_everything() {
        let mut e = engine();
        for _ in 0..6 {
            e.process(&faulty("temp1", 99.9)).unwrap();
        }
        assert!(e.any_alarm());
        e.reset();
        for name in ["temp1", "press", "vib"] {
            assert_eq!(e.state(name).unwrap(), &SensorAlarmState::default());
        }
        assert!(!e.any_alarm());
    }

    #[test]
    fn notification_serializes_for_sinks() {
        let n = Notification {
            sensor: "vib".into(),
            value: 2.0,
            severity: NotificationKind::Hardware,
            message: "x".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["severity"], "hardware");
        assert_eq!(json["sensor"], "vib");
    }
}
