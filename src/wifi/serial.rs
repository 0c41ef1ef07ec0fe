use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Byte channel to the co-processor.
pub trait SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Copies whatever has already arrived into `buf`. Never blocks; returns
    /// 0 when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("port", &self.port.name())
            .finish()
    }
}

impl SerialPortLink {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;

        Ok(SerialPortLink { port })
    }
}

impl SerialLink for SerialPortLink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }

        let len = pending.min(buf.len());
        self.port.read(&mut buf[..len])
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::clock::{Clock, ManualClock, Millis};

    /// Canned co-processor: every written command containing `trigger`
    /// schedules `response` to arrive `after` ms later.
    #[derive(Debug, Clone)]
    pub struct Reply {
        pub trigger: String,
        pub response: Vec<u8>,
        pub after: Millis,
    }

    #[derive(Debug)]
    pub struct ScriptedSerial {
        clock: ManualClock,
        replies: Vec<Reply>,
        pending: Vec<(Millis, Vec<u8>)>,
        pub written: Vec<u8>,
    }

    impl ScriptedSerial {
        pub fn new(clock: ManualClock) -> Self {
            ScriptedSerial {
                clock,
                replies: Vec::new(),
                pending: Vec::new(),
                written: Vec::new(),
            }
        }

        /// A co-processor that acknowledges every command at once.
        pub fn cooperative(clock: ManualClock) -> Self {
            Self::new(clock)
                .reply("AT+CIPSEND", "OK\r\n> ", 0)
                .reply("AT", "OK\r\n", 0)
        }

        pub fn reply(mut self, trigger: &str, response: &str, after: Millis) -> Self {
            self.replies.push(Reply {
                trigger: trigger.to_string(),
                response: response.as_bytes().to_vec(),
                after,
            });
            self
        }

        /// Bytes that show up at an absolute time, regardless of what is written.
        pub fn emit_at(mut self, at: Millis, response: &str) -> Self {
            self.pending.push((at, response.as_bytes().to_vec()));
            self
        }

        pub fn written_text(&self) -> String {
            String::from_utf8_lossy(&self.written).into_owned()
        }

        pub fn count_written(&self, needle: &str) -> usize {
            self.written_text().matches(needle).count()
        }
    }

    impl SerialLink for ScriptedSerial {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);

            let text = String::from_utf8_lossy(bytes);
            // First matching rule wins, so specific triggers go first.
            if let Some(reply) = self.replies.iter().find(|r| text.contains(&r.trigger)) {
                self.pending
                    .push((self.clock.now() + reply.after, reply.response.clone()));
            }
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let now = self.clock.now();
            let mut len = 0;

            self.pending.retain(|(at, bytes)| {
                if *at <= now && len + bytes.len() <= buf.len() {
                    buf[len..len + bytes.len()].copy_from_slice(bytes);
                    len += bytes.len();
                    false
                } else {
                    true
                }
            });
            Ok(len)
        }
    }
}
