use std::{
    collections::VecDeque,
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use serialport::SerialPort;
use tracing::{info, warn};

use climate_common::SerialConfig;

use crate::error::LinkError;

const MAX_LINE_BYTES: usize = 1024;
const READ_CHUNK_BYTES: usize = 256;

/// Source of inbound device lines. `Ok(None)` means the read timed out.
pub trait LineSource: Send {
    fn read_line(&mut self) -> Result<Option<String>, LinkError>;
}

/// Sink for outbound device commands. Each call is one complete command.
pub trait CommandSink: Send {
    fn write_command(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}

/// Opens a fresh device link as independent read and write halves.
pub trait LinkOpener: Send + Sync {
    fn open(&self) -> Result<(Box<dyn LineSource>, Box<dyn CommandSink>), LinkError>;
}

/// Reassembles newline-delimited lines from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
    lines: VecDeque<String>,
    discarding: bool,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                let raw = std::mem::take(&mut self.partial);
                // Undecodable bytes are noise from the device reset; drop them.
                let line = String::from_utf8_lossy(&raw)
                    .replace(char::REPLACEMENT_CHARACTER, "")
                    .trim()
                    .to_string();
                if !line.is_empty() {
                    self.lines.push_back(line);
                }
                continue;
            }

            if self.discarding {
                continue;
            }
            if self.partial.len() >= MAX_LINE_BYTES {
                warn!("dropping serial line over {MAX_LINE_BYTES} bytes");
                self.partial.clear();
                self.discarding = true;
                continue;
            }
            self.partial.push(byte);
        }
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

pub struct SerialLineReader {
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl LineSource for SerialLineReader {
    fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; READ_CHUNK_BYTES];
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(read) => {
                self.buffer.push(&chunk[..read]);
                Ok(self.buffer.next_line())
            }
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct SerialCommandWriter {
    port: Box<dyn SerialPort>,
}

impl CommandSink for SerialCommandWriter {
    fn write_command(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Opens the configured serial port.
pub struct SerialOpener {
    pub config: SerialConfig,
}

impl LinkOpener for SerialOpener {
    fn open(&self) -> Result<(Box<dyn LineSource>, Box<dyn CommandSink>), LinkError> {
        let (reader, writer) = open_serial(&self.config)?;
        Ok((Box::new(reader), Box::new(writer)))
    }
}

/// Opens the device port and returns independent read and write handles.
///
/// Blocks for the configured settle delay: the device resets whenever the
/// port is opened and drops anything sent before it is back up.
pub fn open_serial(
    config: &SerialConfig,
) -> Result<(SerialLineReader, SerialCommandWriter), LinkError> {
    let open_err = |source| LinkError::Open {
        port: config.port.clone(),
        source,
    };

    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(open_err)?;
    let writer = port.try_clone().map_err(open_err)?;

    std::thread::sleep(Duration::from_millis(config.settle_ms));
    if let Err(err) = port.clear(serialport::ClearBuffer::Input) {
        warn!("failed to clear serial input buffer: {err}");
    }

    info!("serial link open on {} at {} baud", config.port, config.baud_rate);
    Ok((
        SerialLineReader {
            port,
            buffer: LineBuffer::default(),
        },
        SerialCommandWriter { port: writer },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lines_across_chunks() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"bme_temp: 2");
        assert_eq!(buffer.next_line(), None);

        buffer.push(b"1.5, scd_hum: 40\r\nSP+\n");
        assert_eq!(buffer.next_line().as_deref(), Some("bme_temp: 21.5, scd_hum: 40"));
        assert_eq!(buffer.next_line().as_deref(), Some("SP+"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn skips_blank_lines_and_invalid_utf8() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"\r\n\n\xffH\n");

        assert_eq!(buffer.next_line().as_deref(), Some("H"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn oversized_line_is_dropped_up_to_its_newline() {
        let mut buffer = LineBuffer::default();
        buffer.push(&[b'x'; MAX_LINE_BYTES]);
        buffer.push(b"bme_temp: 99.5\n");
        buffer.push(b"bme_temp: 21.0\n");

        assert_eq!(buffer.next_line().as_deref(), Some("bme_temp: 21.0"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn line_at_the_limit_is_kept() {
        let mut buffer = LineBuffer::default();
        buffer.push(&[b'x'; MAX_LINE_BYTES]);
        buffer.push(b"\n");

        assert_eq!(buffer.next_line().map(|line| line.len()), Some(MAX_LINE_BYTES));
    }
}
