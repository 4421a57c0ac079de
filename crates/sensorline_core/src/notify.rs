//! Destinos de notificação.
//!
//! O motor de alarmes só decide *que* e *o que* notificar. A entrega (popup,
//! webhook, arquivo) acontece aqui, atrás de [`NotificationSink`].

use crate::alerts::{Notification, NotificationKind};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Recebe as intenções de notificação emitidas pelo motor.
pub trait NotificationSink: Send {
    fn notify(&mut self, notification: &Notification);
}

/// Entrega via `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, n: &Notification) {
        match n.severity {
            NotificationKind::Hardware => warn!("🔧 MANUTENÇÃO {}: {}", n.sensor, n.message),
            NotificationKind::Process => warn!("⚠ PROCESSO {}: {}", n.sensor, n.message),
        }
    }
}

/// Log de manutenção persistente ("caixa-preta"), uma linha por evento.
#[derive(Debug)]
pub struct MaintenanceLog {
    path: PathBuf,
    file: File,
}

impl MaintenanceLog {
    /// Abre (ou cria) o arquivo em modo append.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acrescenta `[HH:MM:SS] mensagem`.
    pub fn record(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.file, "[{}] {}", Local::now().format("%H:%M:%S"), message)?;
        self.file.flush()
    }
}

impl NotificationSink for MaintenanceLog {
    fn notify(&mut self, n: &Notification) {
        let tag = match n.severity {
            NotificationKind::Hardware => "HARDWARE",
            NotificationKind::Process => "PROCESS",
        };
        let line = format!("{tag} {} value={} {}", n.sensor, n.value, n.message);
        if let Err(e) = self.record(&line) {
            error!("Falha ao gravar {}: {e}", self.path.display());
        }
    }
}
