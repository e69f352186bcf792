//! Line-oriented message source.
//!
//! Every non-blank line of the input is one message body, in either the JSON
//! or the legacy text format. Acknowledgements are only counted: a line
//! stream has no broker to redeliver from.

use async_trait::async_trait;
use fbi_core::{Delivery, MessageSource, Result};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Reads messages from any buffered async reader, one per line.
///
/// Lines are split on raw bytes, so a body that is not valid UTF-8 still
/// reaches the decoder and is dropped there as malformed.
pub struct LineSource<R> {
    reader: R,
    next_tag: u64,
    acked: u64,
    rejected: u64,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            next_tag: 1,
            acked: 0,
            rejected: 0,
        }
    }

    /// Number of acknowledged deliveries.
    pub fn acked(&self) -> u64 {
        self.acked
    }

    /// Number of rejected deliveries.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl LineSource<BufReader<tokio::fs::File>> {
    /// Read messages from a file.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<tokio::io::Stdin>> {
    /// Read messages from standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn next(&mut self) -> Result<Option<Delivery>> {
        loop {
            let mut line = Vec::new();
            if self.reader.read_until(b'\n', &mut line).await? == 0 {
                return Ok(None);
            }
            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let tag = self.next_tag;
            self.next_tag += 1;
            return Ok(Some(Delivery { tag, body: line }));
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        self.acked += 1;
        debug!("Acknowledged delivery {}", delivery.tag);
        Ok(())
    }

    async fn reject(&mut self, delivery: &Delivery) -> Result<()> {
        self.rejected += 1;
        warn!("Delivery {} left unacknowledged", delivery.tag);
        Ok(())
    }
}
