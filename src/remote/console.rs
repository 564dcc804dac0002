//! Interactive console sessions
//!
//! A console is a line-oriented conversation with a shell on the device:
//! lines are sent, and output is consumed up to an expected marker.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::{Result, RmfAudioError};

/// Line-oriented interactive session
pub trait Console {
    /// Send one line of input (a newline is appended)
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Consume output up to and including `marker`
    ///
    /// Fails with `ConsoleClosed` if the stream ends before the marker appears.
    fn read_until(&mut self, marker: &str) -> Result<String>;
}

impl<C: Console + ?Sized> Console for Box<C> {
    fn send_line(&mut self, line: &str) -> Result<()> {
        (**self).send_line(line)
    }

    fn read_until(&mut self, marker: &str) -> Result<String> {
        (**self).read_until(marker)
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn send_line(&mut self, line: &str) -> Result<()> {
        (**self).send_line(line)
    }

    fn read_until(&mut self, marker: &str) -> Result<String> {
        (**self).read_until(marker)
    }
}

/// Accumulates raw output and splits it at markers
///
/// Output that arrives after a marker is kept for the next read.
#[derive(Debug, Default)]
pub struct MarkerBuffer {
    pending: Vec<u8>,
}

impl MarkerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from `reader` until `marker` has been seen
    pub fn read_until<R: Read>(&mut self, reader: &mut R, marker: &str) -> Result<String> {
        let needle = marker.as_bytes();
        let mut chunk = [0_u8; 4096];
        loop {
            if let Some(end) = find_subslice(&self.pending, needle) {
                let taken: Vec<u8> = self.pending.drain(..end + needle.len()).collect();
                return Ok(String::from_utf8_lossy(&taken).into_owned());
            }
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                log::debug!(
                    "Console ended with {} unread bytes while waiting for '{}'",
                    self.pending.len(),
                    marker
                );
                return Err(RmfAudioError::ConsoleClosed {
                    expected: marker.to_string(),
                });
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Console backed by a locally spawned process, typically `sh`
///
/// Used when the suite runs on the device itself.
pub struct ProcessConsole {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    buffer: MarkerBuffer,
}

impl ProcessConsole {
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| RmfAudioError::ConsoleClosed {
            expected: "stdin of spawned console".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| RmfAudioError::ConsoleClosed {
            expected: "stdout of spawned console".to_string(),
        })?;

        log::debug!("Spawned console process '{}' (pid {})", program, child.id());
        Ok(Self {
            child,
            stdin,
            stdout,
            buffer: MarkerBuffer::new(),
        })
    }

    /// Local shell console
    pub fn shell() -> Result<Self> {
        Self::spawn("sh", &[])
    }
}

impl Console for ProcessConsole {
    fn send_line(&mut self, line: &str) -> Result<()> {
        log::debug!("console <- {}", line);
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn read_until(&mut self, marker: &str) -> Result<String> {
        self.buffer.read_until(&mut self.stdout, marker)
    }
}

impl Drop for ProcessConsole {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_marker_buffer_keeps_trailing_output() {
        let mut reader = Cursor::new(b"hello\nEnter command: more\nEnter command: ".to_vec());
        let mut buffer = MarkerBuffer::new();

        let first = buffer.read_until(&mut reader, "Enter command: ").unwrap();
        assert_eq!(first, "hello\nEnter command: ");
        let second = buffer.read_until(&mut reader, "Enter command: ").unwrap();
        assert_eq!(second, "more\nEnter command: ");
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_marker_buffer_reports_closed_stream() {
        let mut reader = Cursor::new(b"partial output".to_vec());
        let mut buffer = MarkerBuffer::new();
        let err = buffer.read_until(&mut reader, "Enter command: ").unwrap_err();
        assert!(matches!(err, RmfAudioError::ConsoleClosed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_console_round_trip() {
        let mut console = ProcessConsole::shell().unwrap();
        console.send_line("echo ready-marker").unwrap();
        let output = console.read_until("ready-marker").unwrap();
        assert!(output.ends_with("ready-marker"));
    }
}
