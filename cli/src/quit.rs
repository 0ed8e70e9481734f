//! Quit triggers: Ctrl+C, or `q` followed by Enter.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Whether a line typed on stdin asks to quit.
pub fn is_quit_command(line: &str) -> bool {
    matches!(line.trim(), "q" | "Q" | "quit" | "exit")
}

/// Raise the shutdown flag on Ctrl+C or a quit command on stdin.
pub fn spawn_quit_listeners(shutdown: watch::Sender<bool>) {
    let shutdown = Arc::new(shutdown);

    let ctrl_c = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                let _ = ctrl_c.send(true);
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C"),
        }
    });

    // Blocking reads never return on shutdown; the thread is left detached.
    let spawned = std::thread::Builder::new()
        .name("quit-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if is_quit_command(&line) => {
                        info!("Quit requested, shutting down");
                        let _ = shutdown.send(true);
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Stopped reading stdin");
                        return;
                    }
                }
            }
            debug!("Stdin closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Cannot listen for quit commands on stdin");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_commands() {
        assert!(is_quit_command("q"));
        assert!(is_quit_command(" Q \r"));
        assert!(is_quit_command("quit"));
        assert!(!is_quit_command(""));
        assert!(!is_quit_command("quiet"));
    }
}
