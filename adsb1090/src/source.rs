//! Hex frame input.
//!
//! Accepts one frame per line, either plain hex or dump1090 raw format
//! (`*hex;`). Blank lines, `#` comments and lines of the wrong length are
//! skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use adsb1090_core::hex_decode;

/// Extract a valid Mode S hex string from a line.
///
/// Handles plain hex, dump1090 format (`*hex;`), and whitespace.
pub fn clean_hex_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let hex = line
        .strip_prefix('*')
        .and_then(|l| l.strip_suffix(';'))
        .unwrap_or(line);

    is_valid_hex(hex).then(|| hex.to_ascii_uppercase())
}

fn is_valid_hex(s: &str) -> bool {
    (s.len() == 14 || s.len() == 28) && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Frame bytes from one input line.
pub fn parse_frame_line(line: &str) -> Option<Vec<u8>> {
    clean_hex_line(line).and_then(|hex| hex_decode(&hex).ok())
}

/// Send every frame line of `reader` to `tx`.
///
/// Stops at end of input, when `cancel` fires, or when the receiver is gone.
/// Returns the number of frames sent.
pub async fn read_frames<R>(
    reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0u64;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let Some(frame) = parse_frame_line(&line) else {
            trace!(line = %line, "skipping line");
            continue;
        };
        if tx.send(frame).await.is_err() {
            debug!("frame receiver closed");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
