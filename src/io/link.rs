use std::time::Duration;

use log::{debug, info, warn};

use crate::utils::CancellationToken;

use super::{
    line_reader::{DEFAULT_MAX_LINE_LEN, FramedLineReader},
    transport::Transport,
};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Line-framed connection that reopens its transport whenever it fails.
///
/// Connection failures are routine: `connect` retries every `retry_interval`
/// until it succeeds or the token is cancelled. A fault in the middle of a
/// read drops the connection together with any partially received line.
pub struct ResilientLink<T: Transport> {
    name: String,
    transport: T,
    reader: Option<FramedLineReader<T::Stream>>,
    retry_interval: Duration,
    max_line_len: usize,
    token: CancellationToken,
    reconnects: u64,
}

impl<T: Transport> ResilientLink<T> {
    pub fn new(name: impl Into<String>, transport: T, token: CancellationToken) -> Self {
        Self {
            name: name.into(),
            transport,
            reader: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            token,
            reconnects: 0,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Number of times the link was reopened after a fault.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Blocks until the transport is open. Returns `false` only if the token
    /// was cancelled first.
    pub fn connect(&mut self) -> bool {
        if self.reader.is_some() {
            return true;
        }

        let mut failures = 0u64;

        while !self.token.is_cancelled() {
            match self.transport.open() {
                Ok(stream) => {
                    info!(
                        "[{}] Connected to {}",
                        self.name,
                        self.transport.describe()
                    );

                    self.reader = Some(FramedLineReader::with_max_line_len(
                        stream,
                        self.max_line_len,
                    ));
                    return true;
                }
                Err(e) => {
                    if failures == 0 {
                        warn!(
                            "[{}] Cannot open {}: {e}. Retrying every {:?}",
                            self.name,
                            self.transport.describe(),
                            self.retry_interval
                        );
                    } else {
                        debug!("[{}] Connection attempt {} failed: {e}", self.name, failures + 1);
                    }
                    failures += 1;

                    if self.token.wait_timeout(self.retry_interval) {
                        break;
                    }
                }
            }
        }

        false
    }

    /// Returns the next raw line, reconnecting as needed.
    ///
    /// `None` means no complete line arrived within one read timeout, or the
    /// link was cancelled; callers check their token and call again.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.token.is_cancelled() || !self.connect() {
                return None;
            }

            let reader = self.reader.as_mut()?;

            match reader.next_line() {
                Ok(line) => return line,
                Err(e) => {
                    warn!(
                        "[{}] Transport fault on {}: {e}. Reconnecting",
                        self.name,
                        self.transport.describe()
                    );

                    // The partial record cannot be resumed on a new connection
                    self.reader = None;
                    self.reconnects += 1;
                }
            }
        }
    }

    /// Releases the transport. The next read will reconnect.
    pub fn disconnect(&mut self) {
        if self.reader.take().is_some() {
            info!("[{}] Released {}", self.name, self.transport.describe());
        }
    }
}
