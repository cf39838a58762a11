use std::{
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::utils::CancellationToken;

use super::rig::FrameHandler;

/// Fixed-rate timer that drives a [`FrameHandler`] on its own thread.
///
/// Ticks are scheduled against absolute deadlines, so a slow tick shortens
/// the following wait instead of shifting every later frame. Ticks that are
/// missed entirely are dropped, not replayed.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    period: Duration,
    token: CancellationToken,
}

impl FrameScheduler {
    pub fn new(period: Duration, token: CancellationToken) -> Self {
        Self { period, token }
    }

    pub fn from_fps(fps: f64, token: CancellationToken) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / fps), token)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Ticks `handler` until the token is cancelled, then calls
    /// [`FrameHandler::on_cancel`] once and returns the handler.
    pub fn run<H: FrameHandler>(&self, mut handler: H) -> H {
        debug!("Frame scheduler started, period {:?}", self.period);

        let mut deadline = Instant::now() + self.period;

        while !self.token.wait_timeout(deadline.saturating_duration_since(Instant::now())) {
            handler.on_tick();

            deadline += self.period;

            let now = Instant::now();
            if deadline < now {
                let behind = now - deadline;
                let skipped = behind.as_nanos() / self.period.as_nanos().max(1) + 1;
                warn!("Frame overrun, dropping {skipped} tick(s)");

                deadline += self.period * skipped as u32;
            }
        }

        handler.on_cancel();
        debug!("Frame scheduler stopped");

        handler
    }

    pub fn spawn<H: FrameHandler + 'static>(self, handler: H) -> io::Result<JoinHandle<H>> {
        thread::Builder::new()
            .name("frame-scheduler".to_string())
            .spawn(move || self.run(handler))
    }
}
