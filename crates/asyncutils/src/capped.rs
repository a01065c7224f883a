use futures::io::AsyncRead;
use pin_project_lite::pin_project;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Error as IoError, Result as IoResult};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Error carried inside an [`std::io::Error`] when a [`CappedReader`]'s
/// inner reader has more than `limit` bytes to give.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitExceeded {
    pub limit: u64,
}

impl Display for LimitExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "body exceeds the {} byte limit", self.limit)
    }
}

impl std::error::Error for LimitExceeded {}

impl LimitExceeded {
    /// Find a `LimitExceeded` inside an I/O error, if that is what it wraps.
    pub fn find(err: &IoError) -> Option<&LimitExceeded> {
        err.get_ref()?.downcast_ref::<LimitExceeded>()
    }
}

pin_project! {
    /// Reader that yields at most `limit` bytes.
    ///
    /// Unlike [`AsyncReadExt::take`](futures::io::AsyncReadExt::take), hitting
    /// the limit is not EOF: once `limit` bytes have been yielded the inner
    /// reader is asked for one more byte, and if there is one the read fails
    /// with [`LimitExceeded`].
    pub struct CappedReader<R> {
        #[pin]
        reader: R,
        limit: u64,
        remaining: u64,
    }
}

impl<R> CappedReader<R> {
    pub fn new(reader: R, limit: u64) -> Self {
        Self { reader, limit, remaining: limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl<R: AsyncRead> AsyncRead for CappedReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<IoResult<usize>> {
        let this = self.project();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if *this.remaining == 0 {
            let mut extra = [0u8; 1];
            let n = ready!(this.reader.poll_read(cx, &mut extra))?;
            return Poll::Ready(match n {
                0 => Ok(0),
                _ => Err(IoError::other(LimitExceeded { limit: *this.limit })),
            });
        }
        let max = buf.len().min(usize::try_from(*this.remaining).unwrap_or(usize::MAX));
        let n = ready!(this.reader.poll_read(cx, &mut buf[..max]))?;
        *this.remaining -= n as u64;
        Poll::Ready(Ok(n))
    }
}
