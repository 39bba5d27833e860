//! Background reader for a child's merged stdout/stderr

use std::io::{self, BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

/// Keeps reading a child's output until EOF so the child never blocks on a
/// full pipe.
#[derive(Debug)]
pub struct OutputDrain {
    handle: JoinHandle<()>,
}

impl OutputDrain {
    /// Drain `stream`, logging every line under the process key.
    pub fn spawn<R>(key: &str, stream: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let process = key.to_string();
        Self::spawn_with(key, stream, move |line| {
            info!(process = %process, "{line}");
        })
    }

    /// Drain `stream`, handing every line (without its newline) to `sink`.
    pub fn spawn_with<R, F>(key: &str, stream: R, mut sink: F) -> io::Result<Self>
    where
        R: Read + Send + 'static,
        F: FnMut(&str) + Send + 'static,
    {
        let name = key.to_string();
        let handle = thread::Builder::new()
            .name(format!("output-{name}"))
            .spawn(move || {
                let mut reader = BufReader::new(stream);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            sink(line.trim_end_matches(['\n', '\r']));
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!(process = %name, error = %e, "output drain stopped");
                            break;
                        }
                    }
                }
            })?;
        Ok(Self { handle })
    }

    /// Wait for EOF on the drained stream.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("output drain thread panicked");
        }
    }
}
