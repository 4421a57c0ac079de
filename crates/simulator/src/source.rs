//! Sensor simulado – replay de uma forma de onda gravada.
//!
//! Cada sensor roda na própria thread, lê `<data_dir>/<nome>_data.txt` uma
//! única vez e emite um pacote por amostra no intervalo configurado. Cada
//! leitura sorteia, de forma independente, uma falha de hardware.
//!
//! Quando as amostras acabam sem reset, o sensor passa a emitir um pacote de
//! falha fixo (valor 0, `FAULTY`) até o próximo reset ou a parada: ausência
//! de dados não se distingue de um sensor morto.

use crate::control::SimContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensorline_core::config::{SensorConfig, SimulatorConfig};
use sensorline_core::types::{HardwareStatus, TelemetryPacket};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Erros de carga das amostras.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Arquivo {path} indisponível: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Lê o arquivo de amostras por completo.
pub fn load_samples(path: &Path) -> Result<Vec<f64>, SampleError> {
    let content = std::fs::read_to_string(path).map_err(|source| SampleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_samples(&content, path))
}

/// Uma amostra por linha. Linhas vazias são puladas; linhas inválidas
/// também, com aviso.
pub fn parse_samples(content: &str, origin: &Path) -> Vec<f64> {
    content
        .lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match line.parse::<f64>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("{}:{}: amostra inválida {line:?} ({e})", origin.display(), n + 1);
                    None
                }
            }
        })
        .collect()
}

pub struct SensorSource {
    config: SensorConfig,
    samples: Vec<f64>,
    fault_probability: f64,
    rng: StdRng,
    ctx: SimContext,
}

impl SensorSource {
    /// Carrega as amostras do sensor a partir do diretório de dados.
    pub fn load(
        config: SensorConfig,
        sim: &SimulatorConfig,
        ctx: SimContext,
    ) -> Result<Self, SampleError> {
        let samples = load_samples(&sim.data_file(&config.name))?;
        info!("{}: {} amostras carregadas", config.name, samples.len());
        Ok(Self::from_samples(config, samples, sim.fault_probability, ctx))
    }

    pub fn from_samples(
        config: SensorConfig,
        samples: Vec<f64>,
        fault_probability: f64,
        ctx: SimContext,
    ) -> Self {
        Self {
            config,
            samples,
            fault_probability: fault_probability.clamp(0.0, 1.0),
            rng: StdRng::from_os_rng(),
            ctx,
        }
    }

    /// Semente fixa para o sorteio de falhas.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Loop principal. Retorna apenas quando `running` baixa.
    pub fn run(self) {
        let SensorSource {
            config,
            samples,
            fault_probability,
            mut rng,
            ctx,
        } = self;
        let signals = &ctx.signals;
        let interval = config.interval();
        let mut seen = signals.register_producer();
        info!("Sensor {} (id {}) iniciado", config.name, config.id);

        'session: while signals.is_running() {
            for &value in &samples {
                if signals.observe_reset(&mut seen) {
                    info!("Sensor {}: reinício (ciclo {seen})", config.name);
                    continue 'session;
                }
                if !signals.is_running() {
                    break 'session;
                }

                let status = if rng.random_bool(fault_probability) {
                    HardwareStatus::Faulty
                } else {
                    HardwareStatus::Ok
                };
                let packet = TelemetryPacket::new(config.id, &config.name, value, status);
                if !ctx.publish(seen, packet) {
                    debug!("Sensor {}: pacote anterior ao reset descartado", config.name);
                }

                if !signals.wait(interval) {
                    break 'session;
                }
            }

            warn!("Sensor {}: fim dos dados gravados, sinalizando falha", config.name);
            loop {
                if signals.observe_reset(&mut seen) {
                    info!("Sensor {}: reinício (ciclo {seen})", config.name);
                    continue 'session;
                }
                if !signals.is_running() {
                    break 'session;
                }
                ctx.publish(seen, TelemetryPacket::fault(config.id, &config.name));
                if !signals.wait(interval) {
                    break 'session;
                }
            }
        }

        signals.deregister_producer(seen);
        info!("Sensor {} encerrado", config.name);
    }
}

/// Sobe a thread de um sensor. Sem arquivo de dados a thread termina
/// sozinha, sem afetar os demais sensores.
pub fn spawn_sensor(
    config: SensorConfig,
    sim: &SimulatorConfig,
    ctx: SimContext,
) -> io::Result<JoinHandle<()>> {
    let sim = sim.clone();
    std::thread::Builder::new()
        .name(format!("sensor-{}", config.name))
        .spawn(move || {
            let name = config.name.clone();
            match SensorSource::load(config, &sim, ctx) {
                Ok(source) => source.run(),
                Err(e) => error!("Sensor {name} desativado: {e}"),
            }
        })
}
