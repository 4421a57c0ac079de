//! Entrada do operador (stdin), uma palavra por linha.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::{self, BufRead};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Reinicia o simulador e limpa o estado local.
    Restart,
    /// Desliga o simulador e encerra o monitor.
    Shutdown,
    /// Resumo por sensor no log.
    Status,
    /// Encerra só o monitor.
    Quit,
}

impl OperatorCommand {
    /// Aceita maiúsculas/minúsculas e espaços nas bordas.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "restart" | "r" => Some(OperatorCommand::Restart),
            "shutdown" => Some(OperatorCommand::Shutdown),
            "status" | "s" => Some(OperatorCommand::Status),
            "quit" | "q" | "exit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

/// Lê comandos até EOF ou até o receiver sumir. EOF vira `Quit`.
pub fn read_commands<R: BufRead>(reader: R, tx: &Sender<OperatorCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Erro ao ler stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match OperatorCommand::parse(&line) {
            Some(cmd) => {
                if tx.send(cmd).is_err() {
                    return;
                }
            }
            None => warn!("Comando desconhecido: {:?} (restart, shutdown, status, quit)", line.trim()),
        }
    }
    debug!("Fim da entrada do operador");
    let _ = tx.send(OperatorCommand::Quit);
}

/// Thread que lê o stdin do processo.
pub fn spawn_stdin_reader() -> io::Result<Receiver<OperatorCommand>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("operator-input".into())
        .spawn(move || read_commands(io::stdin().lock(), &tx))?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_operator_words() {
        assert_eq!(OperatorCommand::parse(" RESTART "), Some(OperatorCommand::Restart));
        assert_eq!(OperatorCommand::parse("shutdown"), Some(OperatorCommand::Shutdown));
        assert_eq!(OperatorCommand::parse("s"), Some(OperatorCommand::Status));
        assert_eq!(OperatorCommand::parse("exit"), Some(OperatorCommand::Quit));
        assert_eq!(OperatorCommand::parse("reboot"), None);
    }

    #[test]
    fn reads_until_eof_then_quits() {
        let (tx, rx) = unbounded();
        read_commands(Cursor::new("status\n\nbogus\nrestart\n"), &tx);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                OperatorCommand::Status,
                OperatorCommand::Restart,
                OperatorCommand::Quit
            ]
        );
    }
}
