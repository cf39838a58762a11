use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};

use crate::{
    telemetry::{Sample, SampleStore, decode_record},
    utils::CancellationToken,
};

use super::{link::ResilientLink, transport::Transport};

/// Counters shared between an ingestor and whoever watches it.
#[derive(Debug, Default)]
pub struct IngestStats {
    applied: AtomicU64,
    malformed: AtomicU64,
    reconnects: AtomicU64,
}

impl IngestStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// Reads JSON records from one transport and keeps a [`SampleStore`] up to
/// date with the latest value per key.
pub struct TelemetryIngestor<T: Transport> {
    link: ResilientLink<T>,
    store: SampleStore,
    token: CancellationToken,
    stats: Arc<IngestStats>,
}

impl<T: Transport> TelemetryIngestor<T> {
    pub fn new(name: impl Into<String>, transport: T, store: SampleStore) -> Self {
        let token = CancellationToken::new();

        Self {
            link: ResilientLink::new(name, transport, token.clone()),
            store,
            token,
            stats: Arc::default(),
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.link = self.link.with_retry_interval(retry_interval);
        self
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.link = self.link.with_max_line_len(max_line_len);
        self
    }

    pub fn name(&self) -> &str {
        self.link.name()
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Blocks until the transport is open; `false` if stopped first.
    pub fn connect(&mut self) -> bool {
        self.link.connect()
    }

    /// Reads until one well-formed record is decoded. Malformed records are
    /// discarded with a warning. `None` if the link went idle or was stopped.
    pub fn read_sample(&mut self) -> Option<Sample> {
        loop {
            let before = self.link.reconnects();
            let line = self.link.next_line();
            self.stats
                .reconnects
                .fetch_add(self.link.reconnects() - before, Ordering::Relaxed);

            let line = line?;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match decode_record(&line) {
                Ok(sample) => return Some(sample),
                Err(e) => {
                    self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!("[{}] Packet format error: {e}", self.link.name());
                }
            }
        }
    }

    /// Reads at most one sample and applies it to the store. Returns `true`
    /// if the store was updated.
    pub fn step(&mut self) -> bool {
        match self.read_sample() {
            Some(sample) => {
                self.store.insert(sample);
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Runs until stopped, then releases the transport.
    pub fn run(&mut self) {
        debug!("[{}] Starting ingestion", self.link.name());

        while !self.token.is_cancelled() {
            self.step();
        }

        self.link.disconnect();
        info!("[{}] Stopped.", self.link.name());
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl<T: Transport + 'static> TelemetryIngestor<T> {
    /// Moves the ingestor onto a dedicated thread.
    pub fn spawn(mut self) -> io::Result<IngestorHandle> {
        let token = self.token.clone();
        let stats = self.stats.clone();
        let store = self.store.clone();

        let handle = thread::Builder::new()
            .name(format!("ingest-{}", self.link.name()))
            .spawn(move || self.run())?;

        Ok(IngestorHandle {
            token,
            stats,
            store,
            handle,
        })
    }
}

pub struct IngestorHandle {
    token: CancellationToken,
    stats: Arc<IngestStats>,
    store: SampleStore,
    handle: JoinHandle<()>,
}

impl IngestorHandle {
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Asks the worker to exit. It notices at its next check point, which
    /// may be up to one read timeout later.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn join(self) -> thread::Result<()> {
        self.token.cancel();
        self.handle.join()
    }
}
