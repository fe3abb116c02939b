//! `barscan capture`: reads stdin as if it were a decoder.
//!
//! Each input line is one decoded payload. An empty line stands for a frame
//! with no code in it.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use scan::{CaptureSession, DecodeEvent, RawBuffer};

use super::Session;

const CHANNEL_CAPACITY: usize = 64;

/// Forward lines from `reader` as decode events until EOF, cancellation or
/// the receiver going away.
async fn feed<R>(reader: R, tx: mpsc::Sender<DecodeEvent>, token: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => line,
        };
        let event = match line {
            Ok(Some(line)) if line.trim().is_empty() => DecodeEvent::NotFound,
            Ok(Some(line)) => DecodeEvent::Decoded(line),
            Ok(None) => break,
            Err(e) => DecodeEvent::Failed(e.to_string()),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

/// Run a capture session over `reader` and return the filled buffer.
async fn capture_from<R>(reader: R, cooldown: Duration) -> Result<(RawBuffer, usize)>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut session = CaptureSession::start(cooldown);
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let feeder = tokio::spawn(feed(reader, tx, session.subscribe()));

    let stop = session.subscribe();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    let mut buffer = RawBuffer::new();
    let result = session.pump(&mut rx, &mut buffer).await;
    session.stop();
    ctrl_c.abort();
    if let Err(e) = feeder.await {
        warn!("stdin reader ended abnormally: {}", e);
    }
    let accepted = result?;
    Ok((buffer, accepted))
}

pub async fn run(session: &Session, cooldown: Duration, commit: bool) -> Result<()> {
    eprintln!("Reading codes from stdin (Ctrl-D to finish)...");
    // Stdin reads cannot be interrupted; after Ctrl-C the process exits once
    // the pending line read returns.
    let (buffer, accepted) = capture_from(BufReader::new(tokio::io::stdin()), cooldown).await?;
    eprintln!("Captured {} code(s).", accepted);

    if !commit {
        if !buffer.is_empty() {
            println!("{}", buffer.as_str());
        }
        return Ok(());
    }

    let mut bench = session.workbench();
    bench.raw_mut().set(buffer.as_str());
    let outcome = bench.add_parsed_to_table()?;
    println!(
        "Batch {}: added {}, skipped {} duplicate(s), {} invalid of {} lines",
        outcome.batch, outcome.added, outcome.skipped, outcome.invalid, outcome.total
    );
    Ok(())
}
