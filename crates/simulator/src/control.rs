//! Sinais de controle do processo e ciclo de reset.
//!
//! `running` é um [`StopSignal`]; `resetRequested` pertence a um coordenador
//! interno. Cada sensor se registra, e ao observar um novo ciclo de reset
//! confirma o recebimento. O coordenador baixa a flag quando o último sensor
//! registrado confirma, então nenhum sensor em particular é "dono" da flag.
//!
//! O dreno da fila e a publicação de pacotes acontecem sob o mesmo lock do
//! ciclo: um sensor que ainda não viu o reset não consegue enfileirar um
//! pacote antigo depois do dreno.

use crate::queue::TelemetryQueue;
use parking_lot::Mutex;
use sensorline_core::signal::StopSignal;
use sensorline_core::types::TelemetryPacket;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct ResetCycle {
    requested: bool,
    generation: u64,
    producers: usize,
    pending: usize,
}

impl ResetCycle {
    fn acknowledge(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 && self.requested {
            self.requested = false;
            info!("Ciclo de reset {} concluído", self.generation);
        }
    }
}

/// Resultado de um pedido de restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Novo ciclo aberto.
    Started { generation: u64, discarded: usize },
    /// Já havia um ciclo aberto; só a fila foi drenada de novo.
    Merged { generation: u64, discarded: usize },
}

/// Flags compartilhadas por todos os sensores e pelo transporte.
#[derive(Debug, Default)]
pub struct ControlSignals {
    running: StopSignal,
    reset: Mutex<ResetCycle>,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Baixa `running`: todos os loops saem na próxima iteração.
    pub fn stop(&self) {
        if self.running.stop() {
            info!("Parada solicitada");
        }
    }

    /// Dorme `interval`, acordando cedo na parada.
    pub fn wait(&self, interval: Duration) -> bool {
        self.running.wait(interval)
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.running
    }

    pub fn is_reset_requested(&self) -> bool {
        self.reset.lock().requested
    }

    pub fn reset_generation(&self) -> u64 {
        self.reset.lock().generation
    }

    /// Registra um produtor. Retorna a geração que ele passa a acompanhar.
    pub fn register_producer(&self) -> u64 {
        let mut cycle = self.reset.lock();
        cycle.producers += 1;
        cycle.generation
    }

    /// Remove um produtor; se ele devia uma confirmação, ela é dada agora.
    pub fn deregister_producer(&self, seen: u64) {
        let mut cycle = self.reset.lock();
        cycle.producers = cycle.producers.saturating_sub(1);
        if cycle.requested && seen != cycle.generation {
            cycle.acknowledge();
        }
    }

    /// Verifica se há um ciclo de reset novo para este produtor. Em caso
    /// positivo atualiza `seen`, confirma e retorna `true`.
    pub fn observe_reset(&self, seen: &mut u64) -> bool {
        let mut cycle = self.reset.lock();
        if *seen == cycle.generation {
            return false;
        }
        *seen = cycle.generation;
        if cycle.requested {
            cycle.acknowledge();
        }
        true
    }

    /// Drena a fila e abre um ciclo de reset, numa única transação.
    pub fn request_restart(&self, queue: &TelemetryQueue) -> RestartOutcome {
        let mut cycle = self.reset.lock();
        let discarded = queue.drain();

        if cycle.requested {
            debug!("Restart durante ciclo {} aberto", cycle.generation);
            return RestartOutcome::Merged {
                generation: cycle.generation,
                discarded,
            };
        }

        cycle.generation += 1;
        cycle.requested = true;
        cycle.pending = cycle.producers;
        if cycle.pending == 0 {
            cycle.requested = false;
        }
        RestartOutcome::Started {
            generation: cycle.generation,
            discarded,
        }
    }

    /// Enfileira `packet` se o produtor estiver na geração corrente.
    pub fn publish(&self, queue: &TelemetryQueue, seen: u64, packet: TelemetryPacket) -> bool {
        let cycle = self.reset.lock();
        if cycle.generation != seen {
            return false;
        }
        queue.push(packet);
        true
    }
}

/// Contexto injetado em cada sensor e no servidor: fila + sinais.
#[derive(Debug, Clone, Default)]
pub struct SimContext {
    pub signals: Arc<ControlSignals>,
    pub queue: TelemetryQueue,
}

impl SimContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Comando `restart`: drena a fila e só então sinaliza o reset.
    pub fn restart(&self) -> RestartOutcome {
        self.signals.request_restart(&self.queue)
    }

    pub fn publish(&self, seen: u64, packet: TelemetryPacket) -> bool {
        self.signals.publish(&self.queue, seen, packet)
    }
}
