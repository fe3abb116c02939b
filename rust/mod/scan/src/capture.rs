//! Camera-decoder front end.
//!
//! The decoder itself lives outside this crate. It reports each frame as a
//! [`DecodeEvent`] and this module decides what reaches the raw buffer.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::buffer::RawBuffer;

/// Pause between two accepted captures, so one code held in front of the
/// camera is not read repeatedly.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(4);

/// One result from the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Decoded(String),
    /// No code in the frame. Routine, never an error.
    NotFound,
    /// The decoder failed.
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("decoder error: {0}")]
pub struct DecoderError(pub String);

/// How [`CaptureSession::handle`] disposed of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Appended to the buffer.
    Accepted(String),
    /// Arrived after the session was stopped.
    Stopped,
    NoCode,
    Blank,
    /// Arrived within the cooldown of the previous capture.
    CoolingDown,
}

/// One scanning session, from `start` until `stop`.
#[derive(Debug)]
pub struct CaptureSession {
    token: CancellationToken,
    cooldown: Duration,
    last_capture: Option<Instant>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::start(DEFAULT_COOLDOWN)
    }
}

impl CaptureSession {
    pub fn start(cooldown: Duration) -> Self {
        info!("capture session started (cooldown {:?})", cooldown);
        Self {
            token: CancellationToken::new(),
            cooldown,
            last_capture: None,
        }
    }

    /// Token a producer can watch to stop feeding events.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop the session. Takes effect before this returns: every later event
    /// is dropped.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            info!("capture session stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Accept the next decoded code immediately.
    pub fn skip_cooldown(&mut self) {
        self.last_capture = None;
    }

    pub fn handle(
        &mut self,
        event: DecodeEvent,
        buffer: &mut RawBuffer,
    ) -> Result<Capture, DecoderError> {
        if !self.is_active() {
            return Ok(Capture::Stopped);
        }
        let text = match event {
            DecodeEvent::NotFound => return Ok(Capture::NoCode),
            DecodeEvent::Failed(msg) => return Err(DecoderError(msg)),
            DecodeEvent::Decoded(text) => text,
        };

        let text = text.trim();
        if text.is_empty() {
            return Ok(Capture::Blank);
        }
        if let Some(last) = self.last_capture {
            if last.elapsed() < self.cooldown {
                debug!("capture ignored during cooldown: {}", text);
                return Ok(Capture::CoolingDown);
            }
        }

        buffer.push(text);
        self.last_capture = Some(Instant::now());
        debug!("captured: {}", text);
        Ok(Capture::Accepted(text.to_string()))
    }

    /// Feed events from `rx` into `buffer` until the channel closes or the
    /// session stops. Returns the number of accepted captures.
    pub async fn pump(
        &mut self,
        rx: &mut mpsc::Receiver<DecodeEvent>,
        buffer: &mut RawBuffer,
    ) -> Result<usize, DecoderError> {
        let token = self.token.clone();
        let mut accepted = 0;
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
            };
            if let Capture::Accepted(_) = self.handle(event, buffer)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }
}
