//! Thread de rede: conecta no simulador, lê JSON por linha e entrega os
//! pacotes ao consumidor via channel.
//!
//! Em qualquer falha de I/O o socket é fechado e a thread tenta de novo após
//! o backoff, indefinidamente. Só [`LinkHandle::stop`] encerra o link: ele
//! derruba o socket (abortando a leitura pendente) e impede a reconexão.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::Mutex;
use sensorline_core::protocol::{Action, ProtocolError, decode_packet, encode_command};
use sensorline_core::signal::StopSignal;
use sensorline_core::types::TelemetryPacket;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mensagem enviada da thread de rede para o consumidor.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    Connected(SocketAddr),
    Packet(TelemetryPacket),
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("sem conexão ativa")]
    NotConnected,

    #[error(transparent)]
    Encode(#[from] ProtocolError),

    #[error("falha no envio: {0}")]
    Io(#[from] io::Error),
}

/// Parâmetros do link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub address: String,
    pub connect_timeout: Duration,
    pub backoff: Duration,
}

type SharedSocket = Arc<Mutex<Option<TcpStream>>>;

/// Lado de controle do link, usado pela thread principal.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    socket: SharedSocket,
    stop: Arc<StopSignal>,
}

impl LinkHandle {
    /// Envia `{"action", "params", "timestamp"}` pelo socket ativo.
    pub fn send_command(&self, action: Action) -> Result<(), LinkError> {
        let line = encode_command(action)?;
        // Escrita fora do lock
        let stream = match self.socket.lock().as_ref() {
            Some(stream) => stream.try_clone()?,
            None => {
                warn!("Comando {action} não enviado: sem conexão ativa");
                return Err(LinkError::NotConnected);
            }
        };
        let mut writer = &stream;
        match writer.write_all(line.as_bytes()) {
            Ok(()) => {
                info!("Comando enviado: {action}");
                Ok(())
            }
            Err(e) => {
                warn!("Falha ao enviar {action}: {e}");
                Err(e.into())
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.lock().is_some()
    }

    /// Kill switch: nenhuma reconexão depois disso.
    pub fn stop(&self) {
        if !self.stop.stop() {
            return;
        }
        if let Some(stream) = self.socket.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        info!("Link de rede parado");
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_running()
    }
}

/// Inicia a thread de rede.
pub fn spawn_link(
    config: LinkConfig,
) -> io::Result<(LinkHandle, Receiver<LinkEvent>, JoinHandle<()>)> {
    let (tx, rx) = bounded::<LinkEvent>(256);
    let handle = LinkHandle {
        socket: Arc::new(Mutex::new(None)),
        stop: Arc::new(StopSignal::new()),
    };

    let link = handle.clone();
    let thread = std::thread::Builder::new()
        .name("tcp-receiver".into())
        .spawn(move || link_loop(&config, &link, &tx))?;

    Ok((handle, rx, thread))
}

fn link_loop(config: &LinkConfig, link: &LinkHandle, tx: &Sender<LinkEvent>) {
    while link.is_running() {
        info!("Conectando em {}...", config.address);
        match connect(&config.address, config.connect_timeout, &link.stop) {
            Ok(stream) => {
                let peer = stream.peer_addr().ok();
                match session(stream, link, tx) {
                    SessionEnd::ConsumerGone => return,
                    SessionEnd::Closed(reason) => {
                        if link.is_running() {
                            warn!("Conexão perdida: {reason}. Tentando novamente...");
                        } else {
                            debug!("Sessão com {peer:?} encerrada pelo stop");
                        }
                    }
                }
                if tx.send(LinkEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                if link.is_running() {
                    warn!("Falha ao conectar em {}: {e}", config.address);
                }
            }
        }

        if !link.stop.wait(config.backoff) {
            break;
        }
    }
    info!("Thread de rede encerrada");
}

/// Conecta numa thread auxiliar para que o stop não espere o timeout.
fn connect(address: &str, timeout: Duration, stop: &StopSignal) -> io::Result<TcpStream> {
    let (tx, rx) = bounded(1);
    let address = address.to_string();
    std::thread::Builder::new()
        .name("tcp-connect".into())
        .spawn(move || {
            let _ = tx.send(connect_blocking(&address, timeout));
        })?;

    select! {
        recv(rx) -> result => result.unwrap_or_else(|_| Err(io::Error::other("thread de conexão perdida"))),
        recv(stop.receiver()) -> _ => Err(io::Error::new(io::ErrorKind::Interrupted, "link parado")),
    }
}

fn connect_blocking(address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "endereço sem resolução");
    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

enum SessionEnd {
    Closed(String),
    ConsumerGone,
}

fn session(stream: TcpStream, link: &LinkHandle, tx: &Sender<LinkEvent>) -> SessionEnd {
    let reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(e) => return SessionEnd::Closed(e.to_string()),
    };

    // Publica o socket sob o lock; um stop concorrente ou já o vê, ou já
    // baixou a flag antes disso.
    {
        let mut slot = link.socket.lock();
        if !link.is_running() {
            let _ = stream.shutdown(Shutdown::Both);
            return SessionEnd::Closed("link parado".into());
        }
        *slot = Some(stream);
    }

    let end = match reader.peer_addr() {
        Ok(peer) => {
            info!("Conectado ao simulador em {peer}");
            if tx.send(LinkEvent::Connected(peer)).is_err() {
                SessionEnd::ConsumerGone
            } else {
                read_packets(reader, tx)
            }
        }
        Err(e) => SessionEnd::Closed(e.to_string()),
    };

    if let Some(stream) = link.socket.lock().take() {
        let _ = stream.shutdown(Shutdown::Both);
    }
    end
}

fn read_packets(stream: TcpStream, tx: &Sender<LinkEvent>) -> SessionEnd {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return SessionEnd::Closed("simulador fechou a conexão".into()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if line.trim().is_empty() {
                    continue;
                }
                match decode_packet(&line) {
                    Ok(packet) => {
                        if tx.send(LinkEvent::Packet(packet)).is_err() {
                            return SessionEnd::ConsumerGone;
                        }
                    }
                    Err(e) => warn!("Linha inválida descartada: {e}"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return SessionEnd::Closed(e.to_string()),
        }
    }
}
