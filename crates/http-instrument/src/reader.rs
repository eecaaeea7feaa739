//! Response-side stream decoration

use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use h1stream::{ResponseParser, TimestampNs};

use crate::connection::MonitoredConnection;
use crate::event::StreamListener;
use crate::tracker::ResponseTracker;

/// Decorates the inbound half of a connection.
///
/// Every read is forwarded to the inner stream unchanged; the bytes it
/// returns are then fed to a [`ResponseParser`] whose callbacks drive a
/// [`ResponseTracker`]. Instrumentation never changes what the caller sees:
/// a fault inside the parser (including a panic raised by a listener)
/// disables parsing for the rest of the stream, and I/O errors are
/// published to listeners and then returned exactly as the inner stream
/// produced them.
#[derive(Debug)]
pub struct ParsingReader<R> {
    inner:   R,
    parser:  ResponseParser,
    tracker: ResponseTracker,
}

impl<R> ParsingReader<R> {
    pub fn new(inner: R, connection: Arc<MonitoredConnection>) -> Self {
        let parser = ResponseParser::with_limits(connection.config().parser_limits());
        Self {
            inner,
            parser,
            tracker: ResponseTracker::new(connection),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StreamListener>) {
        self.tracker.listeners_mut().add(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn StreamListener>) -> bool {
        self.tracker.listeners_mut().remove(listener)
    }

    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    pub fn tracker(&self) -> &ResponseTracker {
        &self.tracker
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reading through this reference bypasses instrumentation.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// The connection is about to close. Stops parsing and releases the
    /// connection's cache entries unless the in-flight transaction already
    /// failed with an I/O fault.
    pub fn notify_closing(&mut self) {
        if !self.tracker.has_error() {
            self.close();
        }
    }

    /// Stop parsing for good and release the connection's cache entries.
    /// The inner stream is left untouched.
    pub fn close(&mut self) {
        self.parser.close();
        self.tracker.release();
    }

    /// Stop parsing and unwrap the inner stream. Dropping the reader
    /// releases the connection's cache entries too.
    pub fn into_inner(mut self) -> R {
        self.close();
        self.inner
    }

    /// Feed bytes just read from the inner stream.
    fn observe(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.tracker.record_read(TimestampNs::now());
        self.guarded(|parser, tracker| {
            parser.add_block(data, tracker);
        });
    }

    /// The inner stream reported end of stream.
    fn observe_eof(&mut self) {
        self.guarded(|parser, tracker| parser.end_of_stream(tracker));
    }

    fn observe_error(&mut self, err: &io::Error) {
        if matches!(
            err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
        ) {
            return;
        }
        self.guarded(|_, tracker| tracker.stream_error(err));
    }

    /// Run instrumentation with panics contained. A panic parks the parser in
    /// its sink; it never reaches the caller of `read`.
    fn guarded(&mut self, f: impl FnOnce(&mut ResponseParser, &mut ResponseTracker)) {
        let Self {
            parser, tracker, ..
        } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *parser, &mut *tracker)));
        if outcome.is_err() {
            crate::trace_error!(
                "{}: response instrumentation panicked, parsing disabled",
                tracker.connection().id()
            );
            parser.close();
        }
    }
}

impl<R: Read> Read for ParsingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.observe_eof();
                Ok(0)
            },
            Ok(n) => {
                self.observe(&buf[..n]);
                Ok(n)
            },
            Err(err) => {
                self.observe_error(&err);
                Err(err)
            },
        }
    }
}

#[cfg(feature = "tokio")]
impl<R> tokio::io::AsyncRead for ParsingReader<R>
where
    R: tokio::io::AsyncRead + Unpin,
{
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        use std::task::Poll;

        let this = self.get_mut();
        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;

        match std::pin::Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let read = &buf.filled()[before..];
                if !read.is_empty() {
                    this.observe(read);
                } else if had_room {
                    this.observe_eof();
                }
                Poll::Ready(Ok(()))
            },
            Poll::Ready(Err(err)) => {
                this.observe_error(&err);
                Poll::Ready(Err(err))
            },
            Poll::Pending => Poll::Pending,
        }
    }
}
