//! Consumidor único: possui o [`AlarmEngine`], o log de alarmes, o
//! histórico rolante por sensor e o watchdog de conexão.
//!
//! Todo o estado mutável do monitor vive aqui e é tocado por uma única
//! thread (a principal), então nada precisa de lock.

use crate::watchdog::ConnectionWatchdog;
use sensorline_core::alerts::{AlarmEngine, AlarmLogEvent, Evaluation, Severity};
use sensorline_core::config::AppConfig;
use sensorline_core::notify::{LogSink, NotificationSink};
use sensorline_core::types::{TelemetryPacket, format_clock};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Estado global exibido pelo monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalStatus {
    Offline,
    AllOk,
    Alarm,
}

impl fmt::Display for GlobalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GlobalStatus::Offline => "OFFLINE",
            GlobalStatus::AllOk => "SYSTEM OK",
            GlobalStatus::Alarm => "ALARM",
        })
    }
}

/// Última leitura de um sensor.
#[derive(Debug, Clone)]
pub struct Reading {
    pub packet: TelemetryPacket,
    pub severity: Severity,
}

pub struct Console {
    engine: AlarmEngine,
    sinks: Vec<Box<dyn NotificationSink>>,
    sensor_order: Vec<String>,
    alarm_log: Vec<AlarmLogEvent>,
    history: HashMap<String, VecDeque<f64>>,
    history_len: usize,
    latest: HashMap<String, Reading>,
    watchdog: ConnectionWatchdog,
    shutdown_requested: bool,
}

impl Console {
    /// Console com o [`LogSink`] como único destino de notificações.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: AlarmEngine::new(&config.sensors, config.alarms),
            sinks: vec![Box::new(LogSink)],
            sensor_order: config.sensors.iter().map(|s| s.name.clone()).collect(),
            alarm_log: Vec::new(),
            history: HashMap::new(),
            history_len: config.monitor.history_len,
            latest: HashMap::new(),
            watchdog: ConnectionWatchdog::new(config.monitor.watchdog_timeout()),
            shutdown_requested: false,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Processa um pacote recebido. Depois de um shutdown, descarta.
    pub fn handle_packet(&mut self, packet: TelemetryPacket, now: Instant) -> Option<Evaluation> {
        if self.shutdown_requested {
            debug!("Pacote de {} descartado após shutdown", packet.sensor);
            return None;
        }

        let evaluation = self.engine.process(&packet)?;
        if self.watchdog.feed(now) {
            info!("Telemetria restabelecida");
        }

        let window = self.history.entry(packet.sensor.clone()).or_default();
        if window.len() >= self.history_len {
            window.pop_front();
        }
        if self.history_len > 0 {
            window.push_back(packet.value);
        }

        if let Some(event) = &evaluation.alarm_log {
            self.alarm_log.push(event.clone());
        }
        if let Some(notification) = &evaluation.notification {
            for sink in &mut self.sinks {
                sink.notify(notification);
            }
        }

        self.latest.insert(
            packet.sensor.clone(),
            Reading {
                packet,
                severity: evaluation.severity,
            },
        );
        Some(evaluation)
    }

    /// Avança o watchdog. Retorna `true` na transição para offline.
    pub fn tick(&mut self, now: Instant) -> bool {
        let fired = self.watchdog.poll(now);
        if fired {
            warn!(
                "Sem telemetria há {:.1}s – sistema OFFLINE",
                self.watchdog.timeout().as_secs_f64()
            );
        }
        fired
    }

    /// Zera motor, log e histórico de uma vez (comando `restart`).
    pub fn restart(&mut self) {
        self.engine.reset();
        self.alarm_log.clear();
        self.history.clear();
        self.latest.clear();
        info!("Log de alarmes e histórico limpos");
    }

    /// Marca o shutdown: o watchdog é desarmado e pacotes futuros descartados.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
        self.watchdog.disarm();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn global_status(&self) -> GlobalStatus {
        if self.watchdog.is_offline() {
            GlobalStatus::Offline
        } else if self.engine.any_alarm() {
            GlobalStatus::Alarm
        } else {
            GlobalStatus::AllOk
        }
    }

    pub fn alarm_log(&self) -> &[AlarmLogEvent] {
        &self.alarm_log
    }

    pub fn history(&self, sensor: &str) -> Option<&VecDeque<f64>> {
        self.history.get(sensor)
    }

    pub fn latest(&self, sensor: &str) -> Option<&Reading> {
        self.latest.get(sensor)
    }

    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    /// Uma linha por sensor, na ordem da configuração.
    pub fn status_lines(&self) -> Vec<String> {
        self.sensor_order
            .iter()
            .map(|name| {
                let Some(reading) = self.latest.get(name) else {
                    return format!("{name:<8} sem dados");
                };
                let p = &reading.packet;
                let state = self.engine.state(name).cloned().unwrap_or_default();
                format!(
                    "{name:<8} {:>9.2} {:<6} {:<13} balde={} falhas={} [{}]",
                    p.value,
                    p.status.as_str(),
                    severity_label(reading.severity),
                    state.process_bucket,
                    state.hardware_faults,
                    format_clock(p.timestamp),
                )
            })
            .collect()
    }

    pub fn log_status(&self) {
        info!(
            "Status global: {} ({} alarmes no log)",
            self.global_status(),
            self.alarm_log.len()
        );
        for line in self.status_lines() {
            info!("  {line}");
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Nominal => "OK",
        Severity::ProcessAlarm => "ALARM",
        Severity::HardwareFault => "SENSOR FAULT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sensorline_core::alerts::{AlarmKind, Notification, NotificationKind, SensorAlarmState};
    use sensorline_core::types::HardwareStatus;
    use std::sync::Arc;
    use std::time::Duration;

    /// Guarda as notificações para inspeção.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Notification>>>);

    impl NotificationSink for Recorder {
        fn notify(&mut self, n: &Notification) {
            self.0.lock().push(n.clone());
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.monitor.history_len = 3;
        config
    }

    fn ok(sensor: &str, value: f64) -> TelemetryPacket {
        TelemetryPacket::new(100, sensor, value, HardwareStatus::Ok)
    }

    fn faulty(sensor: &str, value: f64) -> TelemetryPacket {
        TelemetryPacket::new(100, sensor, value, HardwareStatus::Faulty)
    }

    #[test]
    fn starts_offline_then_all_ok() {
        let mut console = Console::new(&config());
        assert_eq!(console.global_status(), GlobalStatus::Offline);
        console.handle_packet(ok("temp1", 50.0), Instant::now());
        assert_eq!(console.global_status(), GlobalStatus::AllOk);
    }

    #[test]
    fn alarm_status_and_edge_log() {
        let mut console = Console::new(&config());
        let now = Instant::now();
        console.handle_packet(ok("temp1", 90.0), now);
        console.handle_packet(ok("temp1", 95.0), now);
        assert_eq!(console.global_status(), GlobalStatus::Alarm);
        assert_eq!(console.alarm_log().len(), 1);
        assert_eq!(console.alarm_log()[0].kind, AlarmKind::HighLimit);

        console.handle_packet(ok("temp1", 50.0), now);
        assert_eq!(console.global_status(), GlobalStatus::AllOk);
        console.handle_packet(faulty("temp1", 50.0), now);
        assert_eq!(console.alarm_log().len(), 2);
        assert_eq!(console.alarm_log()[1].kind, AlarmKind::HardwareFault);
        assert_eq!(
            console.latest("temp1").unwrap().severity,
            Severity::HardwareFault
        );
    }

    #[test]
    fn history_is_a_rolling_window() {
        let mut console = Console::new(&config());
        for v in [21.0, 22.0, 23.0, 24.0] {
            console.handle_packet(ok("temp1", v), Instant::now());
        }
        let window: Vec<f64> = console.history("temp1").unwrap().iter().copied().collect();
        assert_eq!(window, vec![22.0, 23.0, 24.0]);
    }

    #[test]
    fn unknown_sensor_touches_nothing() {
        let mut console = Console::new(&config());
        assert!(console.handle_packet(ok("ghost", 1.0), Instant::now()).is_none());
        assert!(console.history("ghost").is_none());
        assert_eq!(console.global_status(), GlobalStatus::Offline);
    }

    #[test]
    fn notifications_reach_every_sink() {
        let mut console = Console::new(&config());
        let recorder = Recorder::default();
        console.add_sink(Box::new(recorder.clone()));

        for _ in 0..5 {
            console.handle_packet(ok("press", 99.0), Instant::now());
        }
        let seen = recorder.0.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].severity, NotificationKind::Process);
        assert_eq!(seen[0].sensor, "press");
    }

    #[test]
    fn restart_clears_everything_together() {
        let mut console = Console::new(&config());
        for _ in 0..4 {
            console.handle_packet(faulty("vib", 9.0), Instant::now());
        }
        assert!(!console.alarm_log().is_empty());

        console.restart();
        assert!(console.alarm_log().is_empty());
        assert!(console.history("vib").is_none());
        assert!(console.latest("vib").is_none());
        for name in ["temp1", "optical", "press", "speed", "vib"] {
            assert_eq!(
                console.engine().state(name),
                Some(&SensorAlarmState::default()),
                "{name}"
            );
        }
    }

    #[test]
    fn watchdog_goes_offline_and_recovers() {
        let mut console = Console::new(&config());
        let t0 = Instant::now();
        console.handle_packet(ok("temp1", 50.0), t0);

        assert!(!console.tick(t0 + Duration::from_secs(2)));
        assert!(console.tick(t0 + Duration::from_secs(3)));
        assert_eq!(console.global_status(), GlobalStatus::Offline);

        console.handle_packet(ok("temp1", 50.0), t0 + Duration::from_secs(4));
        assert_eq!(console.global_status(), GlobalStatus::AllOk);
    }

    #[test]
    fn shutdown_disarms_watchdog_and_drops_packets() {
        let mut console = Console::new(&config());
        let t0 = Instant::now();
        console.handle_packet(ok("temp1", 50.0), t0);
        console.request_shutdown();

        assert!(!console.tick(t0 + Duration::from_secs(60)));
        assert_ne!(console.global_status(), GlobalStatus::Offline);
        assert!(console.handle_packet(faulty("temp1", 1.0), t0).is_none());
        assert!(console.alarm_log().is_empty());
        assert_eq!(console.history("temp1").unwrap().len(), 1);
    }

    #[test]
    fn status_lines_follow_config_order() {
        let mut console = Console::new(&config());
        console.handle_packet(ok("press", 30.0), Instant::now());
        let lines = console.status_lines();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("temp1") && lines[0].contains("sem dados"));
        assert!(lines[2].starts_with("press") && lines[2].contains("30.00"));
    }
}
