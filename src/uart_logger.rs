//! Log drain: formats [`LogEntry`]s and writes them out.
//!
//! On ESP-IDF the drain writes to a TX-only UART. On the host it prints to
//! stdout. Either way it runs between effects, never inside `play_note`.
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32-S3 GPIO17 (U1TXD) ──────▶ USB-UART RX
//!                                  └─▶ PC Serial Monitor
//! ```

use core::fmt::Write;

use crate::logging::{BufWriter, LogEntry, LogStream};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Formatted line buffer size.
pub const LINE_LEN: usize = 160;

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 17,
        }
    }
}

/// Format log entry to string.
///
/// Format: `[timestamp_ms] LEVEL: message\n`
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter::new(buf);
    let _ = writeln!(
        writer,
        "[{:8}] {}: {}",
        entry.timestamp_ms,
        entry.level.as_str(),
        entry.text()
    );
    writer.len()
}

/// Format the "messages dropped" notice.
pub fn format_dropped(dropped: u32, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter::new(buf);
    let _ = writeln!(writer, "[WARN] log dropped: {}", dropped);
    writer.len()
}

/// Drain `stream` through `emit`, one formatted line per call.
///
/// Reports and resets the dropped counter if it is non-zero.
/// Returns the number of entries drained.
pub fn drain_with<const N: usize>(stream: &LogStream<N>, mut emit: impl FnMut(&[u8])) -> usize {
    let mut line = [0u8; LINE_LEN];

    let drained = stream.drain_each(|entry| {
        let len = format_log_entry(entry, &mut line);
        emit(&line[..len]);
    });

    let dropped = stream.dropped();
    if dropped > 0 {
        let len = format_dropped(dropped, &mut line);
        emit(&line[..len]);
        stream.reset_dropped();
    }

    drained
}

/// Print everything pending to stdout.
#[cfg(feature = "std")]
pub fn drain_to_stdout<const N: usize>(stream: &LogStream<N>) -> usize {
    use std::io::Write as _;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    drain_with(stream, |line| {
        let _ = out.write_all(line);
    })
}

/// Initialize a TX-only UART for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = esp_idf_svc::hal::uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config = uart::config::Config::default()
        .baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// Write everything pending to `uart`.
#[cfg(target_os = "espidf")]
pub fn drain_to_uart<const N: usize>(uart: &mut UartTxDriver<'_>, stream: &LogStream<N>) -> usize {
    drain_with(stream, |line| {
        let _ = uart.write(line);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_format_log_entry() {
        let mut entry = LogEntry {
            timestamp_ms: 1234,
            level: LogLevel::Info,
            len: 11,
            ..LogEntry::default()
        };
        entry.msg[..11].copy_from_slice(b"tone 440 Hz");

        let mut buf = [0u8; LINE_LEN];
        let len = format_log_entry(&entry, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(formatted, "[    1234] INFO: tone 440 Hz\n");
    }

    #[test]
    fn test_drain_reports_dropped() {
        let stream = LogStream::<2>::new();
        stream.push(1, LogLevel::Warn, b"a");
        stream.push(2, LogLevel::Warn, b"b");
        stream.push(3, LogLevel::Warn, b"c");

        let mut lines = Vec::new();
        let drained = drain_with(&stream, |l| lines.push(String::from_utf8(l.to_vec()).unwrap()));

        assert_eq!(drained, 2);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("WARN: b"));
        assert_eq!(lines[2], "[WARN] log dropped: 1\n");
        assert_eq!(stream.dropped(), 0);
    }
}
