//! Watchdog de conexão do lado do monitor.
//!
//! Independe do conteúdo dos pacotes: cada pacote processado rearma o timer.
//! Se o prazo vence, o monitor passa a exibir "offline". É só observação; a
//! reconexão continua sendo responsabilidade do link TCP.
//!
//! Todas as operações recebem o `Instant` atual, assim os testes não dormem.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ConnectionWatchdog {
    timeout: Duration,
    deadline: Option<Instant>,
    offline: bool,
    disarmed: bool,
}

impl ConnectionWatchdog {
    /// Começa offline e sem prazo: nada foi recebido ainda.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            offline: true,
            disarmed: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Rearma o timer. Retorna `true` se estava offline (voltou a receber).
    pub fn feed(&mut self, now: Instant) -> bool {
        if self.disarmed {
            return false;
        }
        self.deadline = Some(now + self.timeout);
        std::mem::replace(&mut self.offline, false)
    }

    /// Verifica o prazo. Retorna `true` apenas na transição para offline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if !self.disarmed && now >= deadline => {
                self.deadline = None;
                self.offline = true;
                true
            }
            _ => false,
        }
    }

    /// Desliga o watchdog de vez (shutdown intencional).
    pub fn disarm(&mut self) {
        self.disarmed = true;
        self.deadline = None;
        self.offline = false;
    }

    pub fn is_disarmed(&self) -> bool {
        self.disarmed
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Tempo restante até o prazo, se armado.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}
