//! Sinal de parada com semântica de broadcast.
//!
//! Substitui o polling de flags booleanas: quem espera usa
//! [`StopSignal::wait`] (ou o [`StopSignal::receiver`] dentro de um
//! `select!`) e acorda imediatamente quando [`StopSignal::stop`] é chamado.
//! O mecanismo é um channel que nunca recebe mensagens; ao descartar o único
//! `Sender`, todos os receivers ficam desconectados de uma vez.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct StopSignal {
    stopped: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    wake: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            stopped: AtomicBool::new(false),
            trigger: Mutex::new(Some(tx)),
            wake: rx,
        }
    }

    /// Dispara a parada. Retorna `true` apenas na primeira chamada.
    pub fn stop(&self) -> bool {
        self.stopped.store(true, Ordering::SeqCst);
        self.trigger.lock().take().is_some()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Dorme até `timeout` ou até a parada. Retorna `true` se ainda rodando.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_running(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Receiver que desconecta na parada, para uso em `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.wake
    }
}
