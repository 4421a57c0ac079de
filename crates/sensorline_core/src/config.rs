//! Configuração unificada via TOML.
//!
//! Um único `config.toml` alimenta simulador e monitor. O conteúdo é tratado
//! como um retrato congelado na partida.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Teto para esperas configuráveis (segundos).
const MAX_WAIT_SECS: f64 = 3600.0;
/// Teto de uma tentativa de connect (segundos).
const MAX_CONNECT_SECS: f64 = 30.0;

/// Converte segundos sem pânico: negativos/NaN viram zero, excesso satura.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Endereço do link TCP entre simulador e monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl NetworkConfig {
    /// `host:port` pronto para bind/connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Um sensor configurado. Limites valem como `[min, max]`: o valor exatamente
/// no limite ainda é nominal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub id: u32,
    pub name: String,
    #[serde(rename = "min")]
    pub low: f64,
    #[serde(rename = "max")]
    pub high: f64,
    /// Intervalo de amostragem (segundos)
    #[serde(rename = "interval")]
    pub interval_secs: f64,
}

impl SensorConfig {
    pub fn new(id: u32, name: &str, low: f64, high: f64, interval_secs: f64) -> Self {
        Self {
            id,
            name: name.into(),
            low,
            high,
            interval_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }
}

fn default_sensors() -> Vec<SensorConfig> {
    vec![
        SensorConfig::new(100, "temp1", 20.0, 80.0, 0.5),
        SensorConfig::new(101, "optical", 1.0, 100.0, 0.5),
        SensorConfig::new(102, "press", 12.0, 45.0, 0.5),
        SensorConfig::new(103, "speed", 10.0, 180.0, 0.5),
        SensorConfig::new(104, "vib", 0.1, 4.0, 0.5),
    ]
}

/// Configuração do simulador (lado produtor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Diretório com `<nome>_data.txt` de cada sensor
    pub data_dir: PathBuf,
    /// Probabilidade de falha de hardware por leitura (0–1)
    pub fault_probability: f64,
    /// Espera entre subir o transmissor e iniciar os sensores (segundos)
    pub startup_delay_secs: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./test_data"),
            fault_probability: 0.02,
            startup_delay_secs: 2.0,
        }
    }
}

impl SimulatorConfig {
    /// Caminho do arquivo de amostras de um sensor.
    pub fn data_file(&self, sensor_name: &str) -> PathBuf {
        self.data_dir.join(format!("{sensor_name}_data.txt"))
    }

    pub fn startup_delay(&self) -> Duration {
        secs(self.startup_delay_secs)
    }
}

/// Limiares de debounce do motor de alarmes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Violações acumuladas no leaky bucket para notificar
    pub process_bucket_threshold: u32,
    /// Falhas de hardware cumulativas para notificar manutenção
    pub hardware_fault_threshold: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            process_bucket_threshold: 5,
            hardware_fault_threshold: 15,
        }
    }
}

/// Configuração do monitor (lado consumidor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Espera fixa entre tentativas de reconexão (segundos)
    pub reconnect_backoff_secs: f64,
    /// Silêncio máximo do link antes de marcar offline (segundos)
    pub watchdog_timeout_secs: f64,
    /// Limite de uma tentativa de connect (segundos)
    pub connect_timeout_secs: f64,
    /// Amostras mantidas por sensor na janela deslizante
    pub history_len: usize,
    /// Log de manutenção persistente (vazio = desativado)
    pub maintenance_log: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_secs: 2.0,
            watchdog_timeout_secs: 3.0,
            connect_timeout_secs: 1.0,
            history_len: 40,
            maintenance_log: "industrial_monitor.log".into(),
        }
    }
}

impl MonitorConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        secs(self.reconnect_backoff_secs)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        secs(self.watchdog_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }
}

/// Configuração raiz (unifica simulador e monitor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub sensors: Vec<SensorConfig>,
    pub simulator: SimulatorConfig,
    pub alarms: AlarmConfig,
    pub monitor: MonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            sensors: default_sensors(),
            simulator: SimulatorConfig::default(),
            alarms: AlarmConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.network.port == 0 {
            errors.push("Porta não pode ser 0".into());
        }
        if self.network.host.trim().is_empty() {
            errors.push("Host não pode ser vazio".into());
        }

        if self.sensors.is_empty() {
            errors.push("Nenhum sensor configurado".into());
        }
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for s in &self.sensors {
            if !ids.insert(s.id) {
                errors.push(format!("ID de sensor duplicado: {}", s.id));
            }
            if s.name.trim().is_empty() {
                errors.push(format!("Sensor {} sem nome", s.id));
            } else if !names.insert(s.name.as_str()) {
                errors.push(format!("Nome de sensor duplicado: {}", s.name));
            }
            if !(s.low < s.high) {
                errors.push(format!(
                    "Limites inválidos para {}: min {} >= max {}",
                    s.name, s.low, s.high
                ));
            }
            if !(s.interval_secs >= 0.01 && s.interval_secs <= 60.0) {
                errors.push(format!(
                    "Intervalo de {} inválido: {} (0.01–60.0)",
                    s.name, s.interval_secs
                ));
            }
        }

        let p = self.simulator.fault_probability;
        if !(0.0..=1.0).contains(&p) {
            errors.push(format!("Probabilidade de falha inválida: {p} (0–1)"));
        }

        if self.alarms.process_bucket_threshold == 0 {
            errors.push("Limiar do leaky bucket não pode ser 0".into());
        }
        if self.alarms.hardware_fault_threshold == 0 {
            errors.push("Limiar de falhas de hardware não pode ser 0".into());
        }

        // (nome, valor, aceita zero, máximo)
        let timings = [
            ("Timeout do watchdog", self.monitor.watchdog_timeout_secs, false, MAX_WAIT_SECS),
            ("Timeout de conexão", self.monitor.connect_timeout_secs, false, MAX_CONNECT_SECS),
            ("Backoff de reconexão", self.monitor.reconnect_backoff_secs, true, MAX_WAIT_SECS),
            ("Atraso de partida", self.simulator.startup_delay_secs, true, MAX_WAIT_SECS),
        ];
        for (label, value, zero_ok, max) in timings {
            let low_ok = if zero_ok { value >= 0.0 } else { value > 0.0 };
            if !(value.is_finite() && low_ok && value <= max) {
                errors.push(format!("{label} inválido: {value} (máx. {max}s)"));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.network.port, parsed.network.port);
        assert_eq!(config.sensors, parsed.sensors);
        assert_eq!(config.alarms, parsed.alarms);
    }

    #[test]
    fn sensor_keys_follow_external_format() {
        let partial = r#"
[network]
port = 6000

[[sensors]]
id = 7
name = "flow"
min = 1.5
max = 9.0
interval = 0.25
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.network.port, 6000);
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.sensors, vec![SensorConfig::new(7, "flow", 1.5, 9.0, 0.25)]);
        // Outros campos devem ter valor padrão
        assert_eq!(config.alarms.process_bucket_threshold, 5);
        assert_eq!(config.alarms.hardware_fault_threshold, 15);
        assert_eq!(config.monitor.reconnect_backoff(), Duration::from_secs(2));
        assert_eq!(config.monitor.watchdog_timeout(), Duration::from_secs(3));
        assert_eq!(config.simulator.fault_probability, 0.02);
    }

    #[test]
    fn detects_duplicates_and_bad_limits() {
        let mut config = AppConfig::default();
        config.sensors.push(SensorConfig::new(100, "temp1", 5.0, 1.0, 0.5));
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("ID de sensor duplicado")));
        assert!(errors.iter().any(|e| e.contains("Nome de sensor duplicado")));
        assert!(errors.iter().any(|e| e.contains("Limites inválidos")));
    }

    #[test]
    fn detects_bad_tuning() {
        let mut config = AppConfig::default();
        config.simulator.fault_probability = 1.5;
        config.alarms.hardware_fault_threshold = 0;
        config.monitor.watchdog_timeout_secs = 0.0;
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn rejects_infinite_and_oversized_timings() {
        let mut config = AppConfig::default();
        config.monitor.reconnect_backoff_secs = f64::INFINITY;
        config.monitor.watchdog_timeout_secs = f64::NAN;
        config.monitor.connect_timeout_secs = 120.0;
        config.simulator.startup_delay_secs = -1.0;
        let errors = config.validate();
        assert_eq!(errors.len(), 4, "Erros: {:?}", errors);
        assert!(errors.iter().any(|e| e.contains("Backoff de reconexão")));
        assert!(errors.iter().any(|e| e.contains("Timeout do watchdog")));
        assert!(errors.iter().any(|e| e.contains("Timeout de conexão")));
        assert!(errors.iter().any(|e| e.contains("Atraso de partida")));

        // Mesmo sem validar, as conversões não entram em pânico
        assert_eq!(config.monitor.reconnect_backoff(), Duration::MAX);
        assert_eq!(config.monitor.watchdog_timeout(), Duration::ZERO);
        assert_eq!(config.simulator.startup_delay(), Duration::ZERO);
    }

    #[test]
    fn toml_inf_startup_delay_is_rejected() {
        let config: AppConfig = toml::from_str("[simulator]\nstartup_delay_secs = inf\n").unwrap();
        assert!(config.simulator.startup_delay_secs.is_infinite());
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("Atraso de partida")));
        assert_eq!(config.simulator.startup_delay(), Duration::MAX);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nao_existe.toml"));
        assert_eq!(config.sensors.len(), 5);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[network\nport = ").unwrap();
        let config = AppConfig::load(&path);
        assert_eq!(config.network.port, 5000);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.network.port = 7100;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).network.port, 7100);
    }

    #[test]
    fn data_file_derives_from_name() {
        let sim = SimulatorConfig {
            data_dir: PathBuf::from("dados"),
            ..Default::default()
        };
        assert_eq!(sim.data_file("vib"), PathBuf::from("dados").join("vib_data.txt"));
    }
}
