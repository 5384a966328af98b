//! Reader adapter that hashes bytes as they are read.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use sstore_crypto::ChecksumHasher;
use tokio::io::{AsyncRead, ReadBuf};

/// Wraps an `AsyncRead`, feeding every byte it yields into a SHA-256
/// accumulator. The checksum therefore covers exactly the bytes the caller
/// consumed, in a single pass.
pub struct TapReader<R> {
    inner: R,
    hasher: ChecksumHasher,
}

impl<R> TapReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: ChecksumHasher::new(),
        }
    }

    pub fn into_hasher(self) -> ChecksumHasher {
        self.hasher
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TapReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.hasher.update(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}
