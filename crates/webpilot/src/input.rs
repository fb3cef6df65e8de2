//! Terminal input shared by the REPL and the confirmation prompt
//!
//! One detached thread owns stdin and forwards lines into a channel. Readers
//! only ever await the channel, so a prompt that is abandoned mid-wait leaves
//! no read pending and the next line goes to whoever asks next.

use std::io::BufRead;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const LINE_BUFFER: usize = 16;

pub struct LineReader {
    rx: Mutex<mpsc::Receiver<String>>,
}

impl LineReader {
    /// Start the stdin thread
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);

        // a plain thread: a blocked read must not hold up runtime shutdown
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("stdin closed");
        });

        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Next line, or `None` once input is closed
    pub async fn next_line(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Drop lines typed while nobody was asking; returns how many
    pub async fn discard_pending(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
