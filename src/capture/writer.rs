//! Output channel writer
//!
//! Tokens are appended by a dedicated worker thread so the capture thread
//! never touches the disk. The worker drains everything queued, writes one
//! token per line and flushes once the queue is empty.

use crate::token::CanonicalToken;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

enum Command {
    Token(CanonicalToken),
    Close(mpsc::Sender<io::Result<()>>),
}

/// Handle to the writer thread of one capture session
pub struct TokenWriter {
    tx: mpsc::Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TokenWriter {
    /// Create (or truncate) the output file and start the worker
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;

        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("token-writer".to_string())
            .spawn(move || run_writer(file, rx))?;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a token; never blocks. Returns false if the worker is gone.
    pub fn send(&self, token: CanonicalToken) -> bool {
        self.tx.send(Command::Token(token)).is_ok()
    }

    /// Flush and close the file, waiting at most `timeout` for the worker
    ///
    /// Everything queued before this call is written first. Once this
    /// returns no further writes are accepted.
    pub fn close(mut self, timeout: Duration) -> io::Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Close(ack_tx)).is_err() {
            self.join();
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "token writer stopped before close",
            ));
        }

        match ack_rx.recv_timeout(timeout) {
            Ok(result) => {
                self.join();
                result
            }
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("token writer did not close within {:?}", timeout),
            )),
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("token writer thread panicked");
            }
        }
    }
}

fn run_writer(file: File, rx: mpsc::Receiver<Command>) {
    let mut out = BufWriter::new(file);
    let mut failed: Option<io::Error> = None;

    while let Ok(first) = rx.recv() {
        let mut next = Some(first);
        while let Some(cmd) = next.take() {
            match cmd {
                Command::Token(token) => {
                    if failed.is_none() {
                        if let Err(e) = writeln!(out, "{}", token) {
                            log::error!("failed to write token: {}", e);
                            failed = Some(e);
                        }
                    }
                }
                Command::Close(ack) => {
                    let result = match failed.take() {
                        Some(e) => Err(e),
                        None => out.flush(),
                    };
                    drop(out);
                    let _ = ack.send(result);
                    return;
                }
            }
            next = rx.try_recv().ok();
        }

        if failed.is_none() {
            if let Err(e) = out.flush() {
                log::error!("failed to flush output channel: {}", e);
                failed = Some(e);
            }
        }
    }

    // Sender dropped without an explicit close
    let _ = out.flush();
}
