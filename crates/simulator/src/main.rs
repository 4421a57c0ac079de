//! # Sensorline Simulator
//!
//! Replay das formas de onda gravadas de cada sensor, com falhas de hardware
//! aleatórias, transmitidas como JSON por linha sobre TCP.
//!
//! ## Uso
//! ```bash
//! sensorline-simulator                         # config.toml ao lado do executável
//! sensorline-simulator --config linha.toml --data-dir ./test_data
//! ```

use clap::Parser;
use sensorline_core::config::AppConfig;
use sensorline_simulator::{SimContext, TelemetryServer, source};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sensorline-simulator")]
#[command(about = "Simulador da linha de sensores – transmite telemetria via TCP")]
struct Args {
    /// Arquivo de configuração TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Diretório com os arquivos `<sensor>_data.txt`
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // ── Carregar config ──
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    if let Some(dir) = args.data_dir {
        config.simulator.data_dir = dir;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    // ── Servidor TCP ──
    let ctx = SimContext::new();
    let address = config.network.address();
    let server = match TelemetryServer::bind(&address, ctx.clone()) {
        Ok(server) => server,
        Err(e) => {
            error!("Falha ao abrir {address}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.handle() {
        Ok(handle) => {
            if let Err(e) = ctrlc::set_handler(move || handle.stop()) {
                warn!("Handler de Ctrl-C indisponível: {e}");
            }
        }
        Err(e) => warn!("Handle do servidor indisponível: {e}"),
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚙ SENSORLINE SIMULATOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Endereço:  {address}");
    println!("  Sensores:  {}", config.sensors.len());
    println!("  Dados:     {}", config.simulator.data_dir.display());
    println!(
        "  Falhas:    {:.1}% por leitura",
        config.simulator.fault_probability * 100.0
    );
    println!("══════════════════════════════════════════════");
    println!();

    let transmitter = match std::thread::Builder::new()
        .name("tcp-transmitter".into())
        .spawn(move || server.run())
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("Falha ao criar thread do transmissor: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Dá tempo ao monitor de conectar antes dos primeiros pacotes
    let delay = config.simulator.startup_delay();
    if !ctx.signals.wait(delay) {
        let _ = transmitter.join();
        return ExitCode::SUCCESS;
    }

    // ── Sensores ──
    let mut sensors = Vec::with_capacity(config.sensors.len());
    for sensor in &config.sensors {
        match source::spawn_sensor(sensor.clone(), &config.simulator, ctx.clone()) {
            Ok(handle) => {
                info!("Thread iniciada para {}", sensor.name);
                sensors.push(handle);
            }
            Err(e) => error!("Falha ao criar thread de {}: {e}", sensor.name),
        }
    }

    if transmitter.join().is_err() {
        error!("Transmissor terminou em pânico");
    }
    for handle in sensors {
        let _ = handle.join();
    }

    info!("Simulador encerrado");
    ExitCode::SUCCESS
}
