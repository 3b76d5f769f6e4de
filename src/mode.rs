use anyhow::Result;
use async_trait::async_trait;
use bluest::Characteristic;
use thiserror::Error;
use tracing::{error, info};

/// Rejected mode input. The UI surfaces this as a modal alert.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeInputError {
    #[error("Enter a valid byte (0-255)")]
    NotANumber,
    #[error("{0} is out of range, enter a value between 0 and 255")]
    OutOfRange(i64),
}

/// Parses a raw text input into a mode byte.
pub fn parse_mode(input: &str) -> Result<u8, ModeInputError> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| ModeInputError::NotANumber)?;
    u8::try_from(value).map_err(|_| ModeInputError::OutOfRange(value))
}

/// Write seam for the mode byte, so the transmit path can be exercised
/// without a live peripheral.
#[async_trait]
pub trait ModeSink {
    async fn write_mode(&self, value: u8) -> Result<()>;
}

/// Sends the mode byte over the peripheral's writable characteristic.
pub struct CharacteristicSink {
    characteristic: Characteristic,
}

impl CharacteristicSink {
    pub fn new(characteristic: Characteristic) -> Self {
        Self { characteristic }
    }
}

#[async_trait]
impl ModeSink for CharacteristicSink {
    async fn write_mode(&self, value: u8) -> Result<()> {
        // Fire and forget, the peripheral sends no acknowledgment.
        self.characteristic.write_without_response(&[value]).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    NotConnected,
    Failed,
}

/// Writes a single mode byte through the sink, if one is present. Failures
/// are logged and not retried.
pub async fn send_mode<S: ModeSink + Sync>(sink: Option<&S>, value: u8) -> WriteOutcome {
    let Some(sink) = sink else {
        error!("not connected, dropping mode write");
        return WriteOutcome::NotConnected;
    };
    match sink.write_mode(value).await {
        Ok(()) => {
            info!("mode set to {value}");
            WriteOutcome::Written
        }
        Err(e) => {
            error!("mode write failed: {e:#}");
            WriteOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct RecordingSink {
        writes: Mutex<Vec<u8>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ModeSink for RecordingSink {
        async fn write_mode(&self, value: u8) -> Result<()> {
            if self.fail {
                return Err(anyhow!("transmit error"));
            }
            self.writes.lock().unwrap().push(value);
            Ok(())
        }
    }

    #[test]
    fn accepts_full_byte_range() {
        assert_eq!(parse_mode("0"), Ok(0));
        assert_eq!(parse_mode("255"), Ok(255));
        assert_eq!(parse_mode(" 42 "), Ok(42));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(parse_mode("-1"), Err(ModeInputError::OutOfRange(-1)));
        assert_eq!(parse_mode("256"), Err(ModeInputError::OutOfRange(256)));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(parse_mode("abc"), Err(ModeInputError::NotANumber));
        assert_eq!(parse_mode(""), Err(ModeInputError::NotANumber));
        assert_eq!(parse_mode("12.5"), Err(ModeInputError::NotANumber));
    }

    #[tokio::test]
    async fn writes_exactly_one_byte_per_call() {
        let sink = RecordingSink::new();
        for value in [0u8, 255] {
            assert_eq!(send_mode(Some(&sink), value).await, WriteOutcome::Written);
        }
        assert_eq!(*sink.writes.lock().unwrap(), vec![0, 255]);
    }

    #[tokio::test]
    async fn missing_sink_sends_nothing() {
        let outcome = send_mode(None::<&RecordingSink>, 5).await;
        assert_eq!(outcome, WriteOutcome::NotConnected);
    }

    #[tokio::test]
    async fn transmit_failure_is_swallowed() {
        let sink = RecordingSink {
            writes: Mutex::new(Vec::new()),
            fail: true,
        };
        assert_eq!(send_mode(Some(&sink), 7).await, WriteOutcome::Failed);
        assert!(sink.writes.lock().unwrap().is_empty());
    }
}
