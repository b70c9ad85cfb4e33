//! The protocol engine: command multiplexing, reply correlation and retry.
//!
//! [`Engine`] owns the transport, the receive scanner and both request
//! queues, and runs as a single task. Everything that touches the queues or
//! the parser state happens on that one logical flow of control, so no
//! locking is needed:
//!
//! - submissions and observer registration arrive over a directive channel,
//! - the transport read feeds the scanner, which is drained of every
//!   complete frame before the next read is issued,
//! - a single retry deadline covers the oldest transmitted-but-unconfirmed
//!   request.
//!
//! Writes are strictly serialized: a command frame is only put on the wire
//! once both queues were empty, after the previous command was confirmed, or
//! on retry. Replies are correlated oldest-first; requests that were
//! transmitted before a matched command are presumed superseded and are
//! discarded without ever resolving successfully.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::frame;
use crate::protocol::{CommandCode, Frame, FrameScanner, Mode, Reply};
use crate::types::Sample;

/// Interval after which an unconfirmed command is retransmitted.
///
/// There is no retry cap: an unresponsive device is retried until a reply
/// arrives or the engine is torn down.
pub(crate) const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Raw reply payload handed to a request's continuation.
pub(crate) type ReplyPayload = [u8; 6];

/// Payload delivered for implicitly confirmed polls, which have no reply data.
const POLL_CONFIRMED: ReplyPayload = [0; 6];

/// Callback invoked once per validated sample broadcast.
pub(crate) type SampleObserver = Box<dyn FnMut(Sample) + Send>;

/// Instructions sent from the client to the engine task.
pub(crate) enum Directive {
    /// Queue a command for transmission.
    Submit(Submission),
    /// Install the sample observer.
    Observe(SampleObserver),
}

/// A command submission, before the engine assigns it an id.
pub(crate) struct Submission {
    pub command: CommandCode,
    pub mode: Mode,
    /// Whether the mode byte participates in reply correlation. The wire
    /// frame always carries a mode byte either way.
    pub has_mode: bool,
    pub payload: u8,
    pub reply_tx: oneshot::Sender<Result<ReplyPayload>>,
}

/// A queued or outstanding command.
///
/// The continuation (`reply_tx`) fires at most once: with the reply payload
/// on confirmation, with the transport error if the write failed, or never
/// with success when the request is superseded (the dropped sender resolves
/// the caller with [`Error::Superseded`]).
struct Request {
    id: u32,
    command: CommandCode,
    mode: Mode,
    has_mode: bool,
    payload: u8,
    reply_tx: oneshot::Sender<Result<ReplyPayload>>,
}

/// The protocol engine; generic over any duplex byte stream.
pub(crate) struct Engine<T> {
    stream: T,
    scanner: FrameScanner,
    /// Commands queued but not yet transmitted (FIFO).
    pending: VecDeque<Request>,
    /// Commands transmitted, waiting on confirmation (FIFO).
    awaiting: VecDeque<Request>,
    /// Retry deadline for the oldest awaiting entry; `None` when cancelled.
    retry_at: Option<Instant>,
    observer: Option<SampleObserver>,
    directives: mpsc::UnboundedReceiver<Directive>,
    next_id: u32,
}

/// Resolves at the given deadline; never resolves without one.
async fn retry_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<T> Engine<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: T, directives: mpsc::UnboundedReceiver<Directive>) -> Self {
        Self {
            stream,
            scanner: FrameScanner::new(),
            pending: VecDeque::new(),
            awaiting: VecDeque::new(),
            retry_at: None,
            observer: None,
            directives,
            next_id: 0,
        }
    }

    /// Runs the engine until the directive channel closes (clean shutdown)
    /// or the transport fails fatally.
    ///
    /// # Errors
    ///
    /// Returns the transport error on a fatal read failure or when the
    /// stream reaches end of file. Benign interruptions are ignored.
    pub(crate) async fn run(mut self) -> Result<()> {
        let mut buf = [0u8; 64];

        loop {
            tokio::select! {
                directive = self.directives.recv() => match directive {
                    Some(Directive::Submit(submission)) => self.submit(submission).await,
                    Some(Directive::Observe(observer)) => self.observer = Some(observer),
                    None => return Ok(()),
                },
                read = self.stream.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::warn!("transport closed");
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            "transport closed",
                        )));
                    }
                    Ok(n) => self.ingest(&buf[..n]).await,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::warn!("failed to recv data: {e}");
                        return Err(Error::Io(e));
                    }
                },
                () = retry_deadline(self.retry_at), if self.retry_at.is_some() => {
                    self.retry_at = None;
                    if let Some(request) = self.awaiting.pop_front() {
                        tracing::debug!(
                            "no reply for cmd {:02X} within {RETRY_INTERVAL:?}, retransmitting",
                            u8::from(request.command)
                        );
                        self.pending.push_front(request);
                    }
                    self.transmit().await;
                }
            }
        }
    }

    /// Queues a command; starts transmitting if nothing is mid-flight.
    async fn submit(&mut self, submission: Submission) {
        let idle = self.pending.is_empty() && self.awaiting.is_empty();

        self.next_id += 1;
        tracing::debug!(
            "sending cmd {:02X} - {:?} {}",
            u8::from(submission.command),
            submission.mode,
            submission.payload,
        );
        self.pending.push_back(Request {
            id: self.next_id,
            command: submission.command,
            mode: submission.mode,
            has_mode: submission.has_mode,
            payload: submission.payload,
            reply_tx: submission.reply_tx,
        });

        if idle {
            self.transmit().await;
        }
    }

    /// Encodes and writes the head of the pending queue.
    ///
    /// On success the request moves to the awaiting queue and the retry
    /// deadline is armed. On write failure the request's continuation is
    /// resolved with the transport error and it is never queued for a reply.
    async fn transmit(&mut self) {
        let Some(request) = self.pending.pop_front() else {
            return;
        };

        let frame = frame::encode_command(request.command, request.mode, request.payload);
        tracing::trace!("SEND: {:02X?}", &frame[..]);

        match self.write_frame(&frame).await {
            Ok(()) => {
                self.awaiting.push_back(request);
                self.retry_at = Some(Instant::now() + RETRY_INTERVAL);
            }
            Err(e) => {
                tracing::warn!("failed to send cmd {:02X}: {e}", u8::from(request.command));
                let _ = request.reply_tx.send(Err(Error::Io(e)));
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    /// Feeds freshly read bytes to the scanner and dispatches every
    /// complete frame before returning to the transport read.
    async fn ingest(&mut self, bytes: &[u8]) {
        self.scanner.feed(bytes);
        loop {
            match self.scanner.next_frame() {
                Ok(Some(frame)) => self.dispatch(frame).await,
                Ok(None) => break,
                Err(e) => tracing::debug!("RECV: dropped frame: {e}"),
            }
        }
    }

    async fn dispatch(&mut self, frame: Frame) {
        match frame {
            Frame::Reply(reply) => self.on_reply(reply).await,
            Frame::Sample(sample) => self.on_sample(sample).await,
            Frame::Unknown { kind, .. } => {
                tracing::debug!("frame type not handled: {kind:02X}");
            }
        }
    }

    /// Correlates a reply against the awaiting queue, oldest first.
    ///
    /// Every entry ahead of the match is presumed superseded: the protocol
    /// permits one command in flight, so a reply to a later command means
    /// earlier unconfirmed ones were lost. Their continuations are dropped
    /// without success.
    async fn on_reply(&mut self, reply: Reply) {
        self.retry_at = None;
        tracing::debug!(
            "recv reply: cmd {:02X} mode {:02X} value {:02X}",
            reply.command(),
            reply.mode(),
            reply.value(),
        );

        let mut matched = None;
        while let Some(request) = self.awaiting.pop_front() {
            let found = u8::from(request.command) == reply.command()
                && (!request.has_mode || u8::from(request.mode) == reply.mode());
            if found {
                matched = Some(request);
                break;
            }
            tracing::debug!("request {} superseded", request.id);
        }

        match matched {
            Some(request) => {
                tracing::debug!("confirmed: {:02X}", u8::from(request.command));
                let _ = request.reply_tx.send(Ok(reply.payload));
            }
            None => tracing::debug!("reply {:02X} matched no outstanding request", reply.command()),
        }

        self.transmit().await;
    }

    /// Handles a sample broadcast.
    ///
    /// The device never sends an explicit reply for a poll; the resulting
    /// sample confirms it implicitly. Broadcasts also arrive without any
    /// poll pending in active mode, so the observer fires regardless.
    async fn on_sample(&mut self, sample: Sample) {
        if self
            .awaiting
            .front()
            .is_some_and(|r| r.command == CommandCode::Query)
        {
            self.retry_at = None;
            if let Some(request) = self.awaiting.pop_front() {
                tracing::debug!("confirmed: {:02X}", u8::from(CommandCode::Query));
                let _ = request.reply_tx.send(Ok(POLL_CONFIRMED));
            }
            self.transmit().await;
        }

        tracing::debug!("sample: {:.1}, {:.1}", sample.pm2_5, sample.pm10);
        if let Some(observer) = &mut self.observer {
            observer(sample);
        }
    }
}
