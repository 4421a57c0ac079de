//! Servidor TCP de telemetria.
//!
//! Aceita um monitor por vez. Para cada conexão roda dois loops sobre o
//! mesmo socket:
//!
//! - **Transmissor** (thread do servidor): fila → uma linha JSON por pacote.
//! - **Receptor** (`cmd-receiver`): linhas de comando → despacho.
//!
//! Quando o monitor cai (EOF, broken pipe, reset) o servidor registra e volta
//! a aceitar conexões; o processo continua vivo.

use crate::control::{RestartOutcome, SimContext};
use crate::queue::Popped;
use crossbeam_channel::{Receiver, bounded};
use parking_lot::Mutex;
use sensorline_core::protocol::{Action, CommandLine, classify_command, encode_packet};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Ação executada ao receber `shutdown`. Por padrão encerra o processo.
pub type ShutdownHook = Arc<dyn Fn() + Send + Sync>;

/// O que o receptor fez com uma linha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Restarted(RestartOutcome),
    Shutdown,
    Ignored,
}

/// Classifica e executa uma linha de comando.
///
/// `shutdown` não é executado aqui: o chamador decide como encerrar.
pub fn dispatch(line: &str, ctx: &SimContext) -> Dispatch {
    let command = classify_command(line);
    let Some(action) = command.action() else {
        match &command {
            CommandLine::Json(envelope) => {
                warn!("Ação desconhecida ignorada: {:?}", envelope.action)
            }
            _ => warn!("Ruído recebido no canal de comandos: {:?}", line.trim()),
        }
        return Dispatch::Ignored;
    };

    match action {
        Action::Restart => {
            let outcome = ctx.restart();
            match outcome {
                RestartOutcome::Started {
                    generation,
                    discarded,
                } => info!("RESTART: ciclo {generation} aberto, {discarded} pacotes descartados"),
                RestartOutcome::Merged {
                    generation,
                    discarded,
                } => info!(
                    "RESTART: ciclo {generation} ainda aberto, {discarded} pacotes descartados"
                ),
            }
            Dispatch::Restarted(outcome)
        }
        Action::Shutdown => Dispatch::Shutdown,
    }
}

pub struct TelemetryServer {
    listener: TcpListener,
    ctx: SimContext,
    active: Arc<Mutex<Option<TcpStream>>>,
    on_shutdown: ShutdownHook,
}

/// Permite parar o servidor de outra thread.
#[derive(Clone)]
pub struct ServerHandle {
    wake_addr: SocketAddr,
    ctx: SimContext,
    active: Arc<Mutex<Option<TcpStream>>>,
}

impl TelemetryServer {
    pub fn bind(addr: &str, ctx: SimContext) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            ctx,
            active: Arc::new(Mutex::new(None)),
            on_shutdown: Arc::new(|| std::process::exit(0)),
        })
    }

    /// Substitui a ação de `shutdown`.
    pub fn with_shutdown_hook(mut self, hook: ShutdownHook) -> Self {
        self.on_shutdown = hook;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> io::Result<ServerHandle> {
        let mut wake_addr = self.local_addr()?;
        if wake_addr.ip().is_unspecified() {
            let loopback = match wake_addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            wake_addr.set_ip(loopback);
        }
        Ok(ServerHandle {
            wake_addr,
            ctx: self.ctx.clone(),
            active: Arc::clone(&self.active),
        })
    }

    /// Loop de accept. Retorna quando `running` baixa.
    pub fn run(self) {
        match self.local_addr() {
            Ok(addr) => info!("Servidor aguardando monitor em {addr}"),
            Err(e) => warn!("Endereço local indisponível: {e}"),
        }

        while self.ctx.signals.is_running() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if !self.ctx.signals.is_running() {
                        break;
                    }
                    info!("Monitor conectado de {peer}");
                    match self.serve(stream) {
                        Ok(()) => info!("Sessão com {peer} encerrada"),
                        Err(e) => warn!("Monitor {peer} desconectado: {e}"),
                    }
                    if self.ctx.signals.is_running() {
                        info!("Aguardando nova conexão...");
                    }
                }
                Err(e) => {
                    error!("Falha no accept: {e}");
                    if !self.ctx.signals.wait(Duration::from_millis(200)) {
                        break;
                    }
                }
            }
        }

        info!("Servidor encerrado ({} pacotes na fila)", self.ctx.queue.len());
    }

    /// Atende uma conexão até o monitor sair ou o processo parar.
    fn serve(&self, stream: TcpStream) -> io::Result<()> {
        let reader = stream.try_clone()?;
        *self.active.lock() = Some(stream.try_clone()?);

        // O receptor derruba `gone_tx` ao sair, acordando o transmissor.
        let (gone_tx, gone_rx) = bounded::<()>(0);
        let ctx = self.ctx.clone();
        let hook = Arc::clone(&self.on_shutdown);
        let receiver = std::thread::Builder::new()
            .name("cmd-receiver".into())
            .spawn(move || {
                command_loop(reader, &ctx, &hook);
                drop(gone_tx);
            })?;

        let result = transmit_loop(&stream, &self.ctx, &gone_rx);

        let _ = stream.shutdown(Shutdown::Both);
        *self.active.lock() = None;
        if receiver.join().is_err() {
            error!("Thread cmd-receiver terminou em pânico");
        }
        result
    }
}

impl ServerHandle {
    /// Parada ordenada: baixa `running`, derruba a conexão ativa e acorda o
    /// `accept` pendente.
    pub fn stop(&self) {
        self.ctx.signals.stop();
        if let Some(stream) = self.active.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        let _ = TcpStream::connect_timeout(&self.wake_addr, Duration::from_millis(500));
    }
}

fn transmit_loop(stream: &TcpStream, ctx: &SimContext, peer_gone: &Receiver<()>) -> io::Result<()> {
    let mut writer = stream;
    loop {
        match ctx.queue.pop_for_peer(ctx.signals.stop_signal(), peer_gone) {
            Popped::Packet(packet) => match encode_packet(&packet) {
                Ok(line) => writer.write_all(line.as_bytes())?,
                Err(e) => error!("Erro ao serializar pacote de {}: {e}", packet.sensor),
            },
            Popped::PeerGone => {
                info!("Monitor fechou a conexão");
                return Ok(());
            }
            Popped::Stopped => return Ok(()),
        }
    }
}

fn command_loop(stream: TcpStream, ctx: &SimContext, on_shutdown: &ShutdownHook) {
    info!("Canal de comandos ativo");
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if line.trim().is_empty() {
                    continue;
                }
                if dispatch(&line, ctx) == Dispatch::Shutdown {
                    warn!("SHUTDOWN recebido. Encerrando processo...");
                    on_shutdown();
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Erro ao ler comando: {e}");
                break;
            }
        }
    }
}
