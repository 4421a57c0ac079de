//! Protocolo de linha sobre TCP.
//!
//! Cada mensagem é um objeto JSON em UTF-8 terminado por `\n`.
//!
//! ```text
//! simulador ──► monitor   {"id":100,"sensor":"temp1","value":42.0,"timestamp":1700000000.5,"status":"OK"}\n
//! monitor   ──► simulador restart\n
//!                         {"action":"shutdown","params":{},"timestamp":1700000001.0}\n
//! ```
//!
//! Comandos aceitam duas formas: palavra-chave pura em minúsculas ou envelope
//! JSON. A linha é classificada antes do despacho em [`CommandLine`].

use crate::types::{TelemetryPacket, unix_now};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Linha vazia")]
    EmptyLine,

    #[error("Erro de serialização: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Pacote inválido: {0}")]
    Deserialize(#[source] serde_json::Error),
}

// ──────────────────────────────────────────────
// Pacotes de telemetria
// ──────────────────────────────────────────────

/// Codifica um [`TelemetryPacket`] como uma linha JSON terminada em `\n`.
pub fn encode_packet(packet: &TelemetryPacket) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(packet).map_err(ProtocolError::Serialize)?;
    line.push('\n');
    Ok(line)
}

/// Decodifica uma linha recebida do simulador.
///
/// Espaços e o terminador de linha são ignorados.
pub fn decode_packet(line: &str) -> Result<TelemetryPacket, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    serde_json::from_str(line).map_err(ProtocolError::Deserialize)
}

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

/// Ações de controle reconhecidas pelo simulador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Restart,
    Shutdown,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Restart => "restart",
            Action::Shutdown => "shutdown",
        }
    }

    /// Aceita apenas a grafia exata em minúsculas.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "restart" => Some(Action::Restart),
            "shutdown" => Some(Action::Shutdown),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope JSON de comando: `{"action", "params", "timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub action: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

impl CommandEnvelope {
    /// Envelope pronto para envio, carimbado com o relógio atual.
    pub fn new(action: Action) -> Self {
        Self {
            action: action.as_str().to_string(),
            params: empty_params(),
            timestamp: Some(unix_now()),
        }
    }

    /// Ação reconhecida, ou `None` se o campo `action` for desconhecido.
    pub fn action(&self) -> Option<Action> {
        Action::from_keyword(&self.action)
    }
}

/// Linha de comando já classificada.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandLine {
    /// Palavra-chave pura (`restart`, `shutdown`).
    Keyword(Action),
    /// Objeto JSON com campo `action` (conhecido ou não).
    Json(CommandEnvelope),
    /// Qualquer outra coisa.
    Unrecognized(String),
}

impl CommandLine {
    /// Ação a executar, se houver.
    pub fn action(&self) -> Option<Action> {
        match self {
            CommandLine::Keyword(action) => Some(*action),
            CommandLine::Json(envelope) => envelope.action(),
            CommandLine::Unrecognized(_) => None,
        }
    }
}

/// Classifica uma linha recebida do monitor.
pub fn classify_command(line: &str) -> CommandLine {
    let line = line.trim();

    if let Some(action) = Action::from_keyword(line) {
        return CommandLine::Keyword(action);
    }

    match serde_json::from_str::<CommandEnvelope>(line) {
        Ok(envelope) => CommandLine::Json(envelope),
        Err(_) => CommandLine::Unrecognized(line.to_string()),
    }
}

/// Codifica um comando JSON terminado em `\n`.
pub fn encode_command(action: Action) -> Result<String, ProtocolError> {
    let mut line =
        serde_json::to_string(&CommandEnvelope::new(action)).map_err(ProtocolError::Serialize)?;
    line.push('\n');
    Ok(line)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
