use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};

use crate::gateway::ByteStream;

/// A byte stream whose first few bytes have been read ahead.
///
/// [`PeekedStream::into_stream`] replays the retained bytes before the rest of
/// the source, so peeking never loses data.
pub struct PeekedStream {
    head: Bytes,
    /// Remainder of the chunk the peek stopped in.
    overflow: Option<Bytes>,
    rest: ByteStream,
}

impl PeekedStream {
    /// Read up to `len` bytes from `source`. Fewer are retained only when the
    /// source ends first.
    pub async fn peek(mut source: ByteStream, len: usize) -> std::io::Result<Self> {
        let mut head = BytesMut::with_capacity(len);
        let mut overflow = None;

        while head.len() < len {
            let Some(chunk) = source.next().await else {
                break;
            };
            let chunk = chunk?;
            let wanted = len - head.len();
            if chunk.len() > wanted {
                head.extend_from_slice(&chunk[..wanted]);
                overflow = Some(chunk.slice(wanted..));
            } else {
                head.extend_from_slice(&chunk);
            }
        }

        Ok(Self {
            head: head.freeze(),
            overflow,
            rest: source,
        })
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }

    pub fn into_stream(self) -> ByteStream {
        let replay = [Some(self.head), self.overflow]
            .into_iter()
            .flatten()
            .filter(|b| !b.is_empty())
            .map(Ok);
        Box::pin(stream::iter(replay).chain(self.rest))
    }
}
