//! # Sensorline Monitor
//!
//! Conecta no simulador, avalia cada leitura contra os limites configurados
//! e registra alarmes e notificações de manutenção.
//!
//! ## Comandos (stdin)
//! - `restart`: reinicia o simulador e limpa log/histórico
//! - `shutdown`: desliga o simulador e sai
//! - `status`: resumo por sensor
//! - `quit`: sai sem tocar no simulador

use clap::Parser;
use crossbeam_channel::{bounded, select, tick};
use sensorline_core::config::AppConfig;
use sensorline_core::notify::MaintenanceLog;
use sensorline_core::protocol::Action;
use sensorline_monitor::net_thread::{self, LinkConfig, LinkEvent};
use sensorline_monitor::{Console, OperatorCommand, input};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sensorline-monitor")]
#[command(about = "Monitor da linha de sensores – alarmes com debounce")]
struct Args {
    /// Arquivo de configuração TOML
    #[arg(short, long)]
    config: Option<PathBuf>,
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

    // ── Config ──
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    // ── Consumidor ──
    let mut console = Console::new(&config);
    if !config.monitor.maintenance_log.is_empty() {
        match MaintenanceLog::open(&config.monitor.maintenance_log) {
            Ok(log) => {
                info!("Log de manutenção: {}", log.path().display());
                console.add_sink(Box::new(log));
            }
            Err(e) => warn!(
                "Log de manutenção {} indisponível: {e}",
                config.monitor.maintenance_log
            ),
        }
    }

    // ── Threads ──
    let link_config = LinkConfig {
        address: config.network.address(),
        connect_timeout: config.monitor.connect_timeout(),
        backoff: config.monitor.reconnect_backoff(),
    };
    let (link, events, link_thread) = match net_thread::spawn_link(link_config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Falha ao criar thread de rede: {e}");
            return ExitCode::FAILURE;
        }
    };
    let commands = match input::spawn_stdin_reader() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Falha ao criar thread de entrada: {e}");
            link.stop();
            return ExitCode::FAILURE;
        }
    };

    let (ctrlc_tx, ctrlc_rx) = bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.try_send(());
    }) {
        warn!("Handler de Ctrl-C indisponível: {e}");
    }

    info!(
        "Monitor ativo – {} sensores, watchdog {:.0}s",
        config.sensors.len(),
        config.monitor.watchdog_timeout().as_secs_f64()
    );

    // ── Loop principal ──
    let ticker = tick(Duration::from_millis(250));
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(LinkEvent::Packet(packet)) => {
                    console.handle_packet(packet, Instant::now());
                }
                Ok(LinkEvent::Connected(peer)) => info!("Simulador conectado ({peer})"),
                Ok(LinkEvent::Disconnected) => warn!("Simulador desconectado"),
                Err(_) => break,
            },
            recv(commands) -> cmd => match cmd {
                Ok(OperatorCommand::Restart) => {
                    if link.send_command(Action::Restart).is_err() {
                        warn!("Restart aplicado só localmente");
                    }
                    console.restart();
                }
                Ok(OperatorCommand::Shutdown) => {
                    console.request_shutdown();
                    if let Err(e) = link.send_command(Action::Shutdown) {
                        warn!("Shutdown não chegou ao simulador: {e}");
                    }
                    break;
                }
                Ok(OperatorCommand::Status) => console.log_status(),
                Ok(OperatorCommand::Quit) | Err(_) => break,
            },
            recv(ctrlc_rx) -> _ => {
                info!("Ctrl-C recebido");
                break;
            },
            recv(ticker) -> _ => {
                console.tick(Instant::now());
            },
        }
    }

    link.stop();
    if link_thread.join().is_err() {
        error!("Thread de rede terminou em pânico");
    }
    info!("Monitor encerrado – status final: {}", console.global_status());
    ExitCode::SUCCESS
}
