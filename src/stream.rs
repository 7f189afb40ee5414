use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Reads exactly `length` bytes from a handle already positioned at the start
/// of a range, then reports end-of-stream.
///
/// The reader is the sole owner of the handle. The handle is released as soon
/// as the range has been read, on the first error, on [`close`], or on drop,
/// whichever comes first, and never more than once.
///
/// Implements [`AsyncRead`], [`Stream`], [`Body`] and [`IntoResponse`].
///
/// [`close`]: BoundedRangeReader::close
#[pin_project]
pub struct BoundedRangeReader<H> {
    #[pin]
    handle: Option<H>,
    length: u64,
    remaining: u64,
    buffer: BytesMut,
}

impl<H> std::fmt::Debug for BoundedRangeReader<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedRangeReader")
            .field("length", &self.length)
            .field("remaining", &self.remaining)
            .field("closed", &self.handle.is_none())
            .finish()
    }
}

impl<H: AsyncRead> BoundedRangeReader<H> {
    pub fn new(handle: H, length: u64) -> Self {
        BoundedRangeReader {
            handle: Some(handle),
            length,
            remaining: length,
            buffer: BytesMut::new(),
        }
    }

    /// Total number of bytes this reader yields.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Releases the handle. Returns `true` only for the call that actually
    /// released it. Reads after closing report end-of-stream.
    pub fn close(self: Pin<&mut Self>) -> bool {
        release(self.project().handle)
    }
}

fn release<H>(mut handle: Pin<&mut Option<H>>) -> bool {
    if handle.is_none() {
        return false;
    }
    handle.set(None);
    tracing::trace!("range reader released its handle");
    true
}

/// Reads at most `remaining` bytes into `buf`, decrementing the counter by
/// what was read.
fn poll_read_bounded<H: AsyncRead>(
    mut handle: Pin<&mut Option<H>>,
    remaining: &mut u64,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
) -> Poll<io::Result<()>> {
    if *remaining == 0 {
        release(handle);
        return Poll::Ready(Ok(()));
    }

    let reader = match handle.as_mut().as_pin_mut() {
        Some(reader) => reader,
        None => return Poll::Ready(Ok(())),
    };

    let nbytes = std::cmp::min(buf.remaining(), usize::try_from(*remaining).unwrap_or(usize::MAX));
    if nbytes == 0 {
        return Poll::Ready(Ok(()));
    }

    let mut limited = buf.take(nbytes);
    match reader.poll_read(cx, &mut limited) {
        Poll::Pending => Poll::Pending,
        Poll::Ready(Err(e)) => {
            release(handle);
            Poll::Ready(Err(e))
        }
        Poll::Ready(Ok(())) => {
            let n = limited.filled().len();
            if n == 0 {
                release(handle);
                let missing = *remaining;
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("storage ended {missing} bytes before the end of the range"),
                )));
            }

            // SAFETY: `limited` was carved out of the unfilled part of `buf`
            // and the inner reader initialized its first `n` bytes.
            unsafe { buf.assume_init(n) };
            buf.advance(n);

            // n <= nbytes <= remaining, so this never underflows
            *remaining -= n as u64;
            if *remaining == 0 {
                release(handle);
            }
            Poll::Ready(Ok(()))
        }
    }
}

impl<H: AsyncRead> AsyncRead for BoundedRangeReader<H> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        poll_read_bounded(this.handle, this.remaining, cx, buf)
    }
}

impl<H: AsyncRead> Stream for BoundedRangeReader<H> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Bytes>>> {
        let this = self.project();

        if *this.remaining == 0 || this.handle.is_none() {
            release(this.handle);
            return Poll::Ready(None);
        }

        // size the next chunk to what is left of the range
        let capacity = std::cmp::min(IO_BUFFER_SIZE as u64, *this.remaining) as usize;
        this.buffer.reserve(capacity);

        let uninit = this.buffer.spare_capacity_mut();
        let mut read_buf = ReadBuf::uninit(uninit);

        match poll_read_bounded(this.handle, this.remaining, cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    return Poll::Ready(None);
                }

                // SAFETY: the reader filled `n` bytes of the spare capacity,
                // and the buffer is always empty between polls
                unsafe { this.buffer.set_len(this.buffer.len() + n) };

                Poll::Ready(Some(Ok(this.buffer.split().freeze())))
            }
        }
    }
}

impl<H: AsyncRead> Body for BoundedRangeReader<H> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<H: AsyncRead + Send + 'static> IntoResponse for BoundedRangeReader<H> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}
