use futures::io::{AsyncRead, AsyncWrite, AsyncWriteExt, copy as async_copy};
use pin_project_lite::pin_project;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Reader that copies everything it yields into a sink.
    ///
    /// Bytes handed to the consumer are written to the sink before the next
    /// read is attempted, and the sink is flushed once the inner reader hits
    /// EOF. A sink failure surfaces as a read error, so the consumer stops at
    /// the same point the sink did.
    ///
    /// Consumers that stop reading before EOF (a decoder reaching the end of
    /// its frame, for example) must call [`TeeReader::finish`] for the sink
    /// to receive the remainder.
    pub struct TeeReader<R, W> {
        #[pin]
        reader: R,
        #[pin]
        sink: W,
        pending: Vec<u8>,
        written: usize,
        bytes_read: u64,
        flushed: bool,
    }
}

impl<R, W> TeeReader<R, W> {
    pub fn new(reader: R, sink: W) -> Self {
        Self {
            reader,
            sink,
            pending: Vec::new(),
            written: 0,
            bytes_read: 0,
            flushed: false,
        }
    }

    /// Total bytes pulled from the inner reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.sink)
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> TeeReader<R, W> {
    /// Write anything the consumer has not pulled yet into the sink, then
    /// flush it. Returns the total number of bytes teed.
    pub async fn finish(&mut self) -> IoResult<u64> {
        if self.written < self.pending.len() {
            self.sink.write_all(&self.pending[self.written..]).await?;
        }
        self.pending.clear();
        self.written = 0;
        self.bytes_read += async_copy(&mut self.reader, &mut self.sink).await?;
        self.sink.flush().await?;
        self.flushed = true;
        Ok(self.bytes_read)
    }
}

fn poll_drain<W: AsyncWrite>(
    mut sink: Pin<&mut W>,
    cx: &mut Context<'_>,
    pending: &mut Vec<u8>,
    written: &mut usize,
) -> Poll<IoResult<()>> {
    while *written < pending.len() {
        let n = ready!(sink.as_mut().poll_write(cx, &pending[*written..]))?;
        if n == 0 {
            return Poll::Ready(Err(IoError::from(IoErrorKind::WriteZero)));
        }
        *written += n;
    }
    pending.clear();
    *written = 0;
    Poll::Ready(Ok(()))
}

impl<R: AsyncRead, W: AsyncWrite> AsyncRead for TeeReader<R, W> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<IoResult<usize>> {
        let mut this = self.project();
        ready!(poll_drain(this.sink.as_mut(), cx, &mut *this.pending, &mut *this.written))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let n = ready!(this.reader.poll_read(cx, buf))?;
        if n == 0 {
            if !*this.flushed {
                ready!(this.sink.poll_flush(cx))?;
                *this.flushed = true;
            }
            return Poll::Ready(Ok(0));
        }
        this.pending.extend_from_slice(&buf[..n]);
        *this.bytes_read += n as u64;
        Poll::Ready(Ok(n))
    }
}
