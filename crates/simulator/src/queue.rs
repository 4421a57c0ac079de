//! Fila FIFO de telemetria: N sensores produzem, o transmissor consome.

use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use sensorline_core::signal::StopSignal;
use sensorline_core::types::TelemetryPacket;

/// Resultado de uma espera em [`TelemetryQueue::pop`].
#[derive(Debug)]
pub enum Popped {
    Packet(TelemetryPacket),
    /// O processo está parando.
    Stopped,
    /// O par do outro lado do socket foi embora.
    PeerGone,
}

/// Fila sem limite: `push` nunca bloqueia e nunca descarta.
#[derive(Debug, Clone)]
pub struct TelemetryQueue {
    tx: Sender<TelemetryPacket>,
    rx: Receiver<TelemetryPacket>,
}

impl Default for TelemetryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, packet: TelemetryPacket) {
        // Só falha sem receivers, e a própria fila mantém um.
        let _ = self.tx.send(packet);
    }

    /// Bloqueia até haver um pacote ou até a parada.
    pub fn pop(&self, stop: &StopSignal) -> Popped {
        self.pop_for_peer(stop, &never())
    }

    /// Como [`pop`](Self::pop), mas também acorda quando `peer_gone`
    /// desconecta.
    pub fn pop_for_peer(&self, stop: &StopSignal, peer_gone: &Receiver<()>) -> Popped {
        if !stop.is_running() {
            return Popped::Stopped;
        }
        select! {
            recv(self.rx) -> msg => match msg {
                Ok(packet) => Popped::Packet(packet),
                Err(_) => Popped::Stopped,
            },
            recv(stop.receiver()) -> _ => Popped::Stopped,
            recv(peer_gone) -> _ => Popped::PeerGone,
        }
    }

    /// Retira um pacote sem bloquear.
    pub fn try_pop(&self) -> Option<TelemetryPacket> {
        self.rx.try_recv().ok()
    }

    /// Esvazia a fila, retornando quantos pacotes foram descartados.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
