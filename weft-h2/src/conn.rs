//! The per-connection HTTP/2 server loop (spec §4.7): send SETTINGS, read
//! and verify the client preface, then repeatedly read one frame and
//! dispatch it.
//!
//! Grounded in the shape of `processHttp2Frames` in
//! `examples/original_source/galay-http/server/Http2Server.cc` (send
//! SETTINGS, read preface, loop-read-and-dispatch-by-type, auto-ACK
//! SETTINGS/PING) with the frame kinds and validation rules replaced by
//! this workspace's own `weft-h2::frame`/`weft-hpack` codec.

use crate::callbacks::Callbacks;
use crate::conv;
use crate::error::{ConnectionError, Error as FrameError, StreamError};
use crate::flow::Window;
use crate::frame::{
    Continuation, Data, GoAway, Head, Headers, Kind, Ping, Priority, RstStream, WindowUpdate,
    FRAME_HEADER_LEN,
};
use crate::scheduler::Scheduler;
use crate::settings::{Settings, SettingsConfig};
use crate::stream::StreamState;
use crate::streams::StreamManager;
use crate::CONNECTION_PREFACE;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use weft_core::io::AsyncIo;
use weft_hpack::{Decoder as HpackDecoder, Encoder as HpackEncoder};
use weft_types::{Reason, RequestHeader, ResponseHeader, WeftError};

/// Local tuning knobs layered on top of the wire SETTINGS (spec §3's
/// "Local tuning" list).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub settings: SettingsConfig,
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub settings_timeout: Option<Duration>,
    pub connection_window_size: u32,
    pub auto_window_update: bool,
    pub window_update_threshold: u32,
    pub enable_priority: bool,
    /// Proactively PING an otherwise-idle peer to detect a dead connection
    /// (spec §3's `auto_ping`/`ping_interval`/`ping_timeout` knobs).
    pub auto_ping: bool,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            settings: SettingsConfig::default(),
            recv_timeout: None,
            send_timeout: None,
            settings_timeout: Some(Duration::from_secs(10)),
            connection_window_size: 65535,
            auto_window_update: true,
            window_update_threshold: 16384,
            enable_priority: true,
            auto_ping: false,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
        }
    }
}

/// An outbound instruction queued by a callback responding to a request,
/// drained by the connection loop's writer after each inbound frame is
/// dispatched — the "single logical write queue" spec §5 requires.
enum Outbound {
    Headers(u32, ResponseHeader, bool),
    Data(u32, Bytes, bool),
    RstStream(u32, Reason),
}

/// A cheap, cloneable reference a callback uses to respond to the stream it
/// was invoked for, standing in for the original's `shared_ptr<Stream>`
/// callback argument.
#[derive(Clone)]
pub struct StreamHandle {
    stream_id: u32,
    tx: tokio::sync::mpsc::UnboundedSender<Outbound>,
}

impl StreamHandle {
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn send_headers(&self, header: ResponseHeader, end_stream: bool) {
        let _ = self.tx.send(Outbound::Headers(self.stream_id, header, end_stream));
    }

    pub fn send_data(&self, data: impl Into<Bytes>, end_stream: bool) {
        let _ = self
            .tx
            .send(Outbound::Data(self.stream_id, data.into(), end_stream));
    }

    pub fn reset(&self, reason: Reason) {
        let _ = self.tx.send(Outbound::RstStream(self.stream_id, reason));
    }
}

/// Pending HEADERS/CONTINUATION reassembly: only one can be in flight per
/// spec §4.4 ("no other frames may interleave until END_HEADERS arrives").
struct PendingHeaderBlock {
    stream_id: u32,
    buffer: BytesMut,
    end_stream: bool,
}

pub struct Connection<IO> {
    io: IO,
    config: ConnectionConfig,
    peer_settings: SettingsConfig,
    local_settings_acked: bool,
    hpack_decoder: HpackDecoder,
    hpack_encoder: HpackEncoder,
    streams: StreamManager,
    scheduler: Scheduler,
    conn_send_window: Window,
    conn_recv_window: Window,
    highest_processed_stream_id: u32,
    goaway_sent: bool,
    goaway_received: bool,
    pending_headers: Option<PendingHeaderBlock>,
    /// DATA queued by a callback but deferred because the send window (
    /// stream or connection) was insufficient at the time; flushed as
    /// WINDOW_UPDATE frames arrive, per spec §4.6 "the frame is deferred".
    deferred_data: HashMap<u32, VecDeque<(Bytes, bool)>>,
    /// Set once the initial SETTINGS is sent; `run` fails the connection
    /// with `SETTINGS_TIMEOUT` if the peer hasn't ACKed by this point.
    settings_deadline: Option<tokio::time::Instant>,
    /// Last time any frame was read from the peer; the auto-ping clock
    /// runs off this rather than wall-clock ticks so a chatty connection
    /// never gets an unnecessary keepalive PING.
    last_activity: tokio::time::Instant,
    /// An outstanding keepalive PING awaiting its ACK, with the deadline by
    /// which it must arrive (`ping_timeout`). `None` means no PING is
    /// currently in flight.
    pending_ping: Option<([u8; 8], tokio::time::Instant)>,
    ping_seq: u64,
}

impl<IO: AsyncIo> Connection<IO> {
    pub fn new(io: IO, config: ConnectionConfig) -> Self {
        let local_window = config.settings.initial_window_size;
        Self {
            hpack_decoder: HpackDecoder::new(config.settings.header_table_size as usize),
            hpack_encoder: HpackEncoder::new(config.settings.header_table_size as usize),
            streams: StreamManager::new(
                config.settings.max_concurrent_streams.unwrap_or(u32::MAX),
                local_window,
            ),
            scheduler: Scheduler::new(),
            conn_send_window: Window::new(65535),
            conn_recv_window: Window::new(config.connection_window_size),
            peer_settings: SettingsConfig::default(),
            local_settings_acked: false,
            highest_processed_stream_id: 0,
            goaway_sent: false,
            goaway_received: false,
            pending_headers: None,
            deferred_data: HashMap::new(),
            settings_deadline: None,
            last_activity: tokio::time::Instant::now(),
            pending_ping: None,
            ping_seq: 0,
            config,
            io,
        }
    }

    /// Runs the connection to completion: handshake, then the frame loop,
    /// until the peer closes or a connection-fatal error occurs.
    pub async fn run(&mut self, callbacks: &dyn Callbacks) -> Result<(), ConnectionError> {
        self.send_settings().await?;
        if let Some(st) = self.config.settings_timeout {
            self.settings_deadline = Some(tokio::time::Instant::now() + st);
        }
        self.read_preface().await?;
        self.last_activity = tokio::time::Instant::now();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Outbound>();

        loop {
            let head = match self.read_head().await {
                Ok(Some(head)) => head,
                Ok(None) => return Ok(()), // clean peer close
                Err(e) => return Err(self.fail(e).await),
            };
            let payload = match self.read_payload(head.length as usize).await {
                Ok(p) => p,
                Err(e) => return Err(self.fail(e.into()).await),
            };

            if let Err(e) = self.dispatch(head, payload, callbacks, &tx).await {
                match e {
                    DispatchOutcome::Stream(stream_err) => {
                        callbacks.on_error(&stream_err).await;
                        self.reset_stream(stream_err.stream_id, stream_err.reason).await?;
                    }
                    DispatchOutcome::Connection(conn_err) => return Err(self.fail(conn_err).await),
                }
            }

            self.drain_outbound(&mut rx).await.map_err(|e| e)?;
        }
    }

    pub fn stream_handle(&self, stream_id: u32, tx: &tokio::sync::mpsc::UnboundedSender<Outbound>) -> StreamHandle {
        StreamHandle {
            stream_id,
            tx: tx.clone(),
        }
    }

    async fn send_settings(&mut self) -> Result<(), ConnectionError> {
        let settings = Settings {
            ack: false,
            config: self.config.settings,
        };
        let payload = Settings::encode_payload(&settings.config);
        let mut out = Vec::new();
        let head = Head {
            kind: Kind::Settings,
            flags: 0,
            stream_id: 0,
            length: payload.len() as u32,
        };
        head.encode(payload.len() as u32, &mut out);
        out.extend_from_slice(&payload);
        self.write_raw(&out).await
    }

    /// A single timeout-bounded `recv` against an explicit duration (rather
    /// than always `self.config.recv_timeout`), so the header-read phase can
    /// be bounded more tightly by the auto-ping/settings-timeout idle clock
    /// per spec §6's `recv_timeout` knob.
    async fn recv_timed(&mut self, buf: &mut [u8], dur: Option<Duration>) -> Result<usize, WeftError> {
        let io = &mut self.io;
        weft_core::io::timeout(dur, io.recv(buf), || WeftError::RecvTimeout).await?
    }

    async fn read_preface(&mut self) -> Result<(), ConnectionError> {
        let mut buf = vec![0u8; CONNECTION_PREFACE.len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .recv_timed(&mut buf[filled..], self.config.recv_timeout)
                .await
                .map_err(|_| ConnectionError::new(Reason::ProtocolError))?;
            if n == 0 {
                // Peer hasn't spoken the protocol; close without GOAWAY.
                return Err(ConnectionError::new(Reason::ProtocolError));
            }
            filled += n;
        }
        if buf != CONNECTION_PREFACE {
            return Err(ConnectionError::new(Reason::ProtocolError));
        }
        Ok(())
    }

    /// Whether the idle clock (settings-ACK deadline or auto-ping schedule)
    /// needs to wake this connection up even though no frame has arrived.
    fn has_idle_timers(&self) -> bool {
        (!self.local_settings_acked && self.settings_deadline.is_some()) || self.config.auto_ping
    }

    /// The duration until the next thing this connection must do even if
    /// the peer sends nothing: ACK-timeout the pending SETTINGS, send a
    /// keepalive PING, or time out a PING that was never ACKed. Bounded
    /// below by the caller's own `recv_timeout`, if set.
    fn idle_tick_remaining(&self) -> Option<Duration> {
        let now = tokio::time::Instant::now();
        let mut bound = self.config.recv_timeout;
        let mut consider = |deadline: tokio::time::Instant| {
            let remaining = deadline.saturating_duration_since(now);
            bound = Some(bound.map_or(remaining, |b| b.min(remaining)));
        };
        if !self.local_settings_acked {
            if let Some(deadline) = self.settings_deadline {
                consider(deadline);
            }
        }
        if self.config.auto_ping {
            let next = match self.pending_ping {
                Some((_, deadline)) => deadline,
                None => self.last_activity + self.config.ping_interval,
            };
            consider(next);
        }
        bound.map(|d| d.max(Duration::from_millis(1)))
    }

    /// Runs due idle-clock work when `read_head` wakes up with no bytes:
    /// fails the connection if a SETTINGS ACK or PING response is overdue,
    /// otherwise fires a keepalive PING if one is due (spec §3's
    /// `auto_ping`/`ping_interval`/`ping_timeout`, and the SETTINGS-ACK
    /// deadline spec §4.7 implies).
    async fn run_idle_tick(&mut self) -> Result<(), ConnectionError> {
        let now = tokio::time::Instant::now();
        if !self.local_settings_acked {
            if let Some(deadline) = self.settings_deadline {
                if now >= deadline {
                    return Err(ConnectionError::new(Reason::SettingsTimeout));
                }
            }
        }
        if self.config.auto_ping {
            match self.pending_ping {
                Some((_, deadline)) if now >= deadline => {
                    return Err(ConnectionError::new(Reason::NoError));
                }
                Some(_) => {}
                None if now >= self.last_activity + self.config.ping_interval => {
                    self.send_keepalive_ping().await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    async fn send_keepalive_ping(&mut self) -> Result<(), ConnectionError> {
        self.ping_seq += 1;
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&self.ping_seq.to_be_bytes());
        let mut out = Vec::new();
        Ping { ack: false, payload }.encode(&mut out);
        self.write_raw(&out).await?;
        self.pending_ping = Some((payload, tokio::time::Instant::now() + self.config.ping_timeout));
        Ok(())
    }

    async fn read_head(&mut self) -> Result<Option<Head>, ConnectionError> {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        let mut filled = 0;
        loop {
            let wait_for_idle = filled == 0 && self.has_idle_timers();
            let dur = if wait_for_idle {
                self.idle_tick_remaining()
            } else {
                self.config.recv_timeout
            };
            match self.recv_timed(&mut buf[filled..], dur).await {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(None);
                    }
                    return Err(FrameError::MalformedMessage.into());
                }
                Ok(n) => {
                    filled += n;
                    if filled == buf.len() {
                        break;
                    }
                }
                Err(_) if wait_for_idle => self.run_idle_tick().await?,
                Err(_) => return Err(FrameError::MalformedMessage.into()),
            }
        }
        self.last_activity = tokio::time::Instant::now();
        let head = Head::parse(&buf).map_err(ConnectionError::from)?;
        if head.length > self.config.settings.max_frame_size {
            return Err(FrameError::BadFrameSize.into());
        }
        Ok(Some(head))
    }

    async fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, FrameError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self
                .recv_timed(&mut buf[filled..], self.config.recv_timeout)
                .await
                .map_err(|_| FrameError::MalformedMessage)?;
            if n == 0 {
                return Err(FrameError::MalformedMessage);
            }
            filled += n;
        }
        Ok(buf)
    }

    async fn dispatch(
        &mut self,
        head: Head,
        payload: Vec<u8>,
        callbacks: &dyn Callbacks,
        tx: &tokio::sync::mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), DispatchOutcome> {
        if self.pending_headers.is_some() && head.kind != Kind::Continuation {
            return Err(DispatchOutcome::Connection(ConnectionError::new(Reason::ProtocolError)));
        }

        match head.kind {
            Kind::Settings => self.on_settings_frame(head, &payload).await?,
            Kind::Ping => self.on_ping_frame(head, &payload, callbacks).await?,
            Kind::GoAway => self.on_goaway_frame(head, &payload, callbacks).await?,
            Kind::WindowUpdate => self.on_window_update_frame(head, &payload, callbacks).await?,
            Kind::RstStream => self.on_rst_stream_frame(head, &payload, callbacks).await?,
            Kind::Priority => self.on_priority_frame(head, &payload, callbacks).await?,
            Kind::Headers => self.on_headers_frame(head, &payload, callbacks, tx).await?,
            Kind::Continuation => self.on_continuation_frame(head, &payload, callbacks, tx).await?,
            Kind::Data => self.on_data_frame(head, &payload, callbacks, tx).await?,
            Kind::PushPromise => {
                // ENABLE_PUSH=0 locally; an unsolicited PUSH_PROMISE is a
                // connection error per spec §4.7/§9.
                return Err(DispatchOutcome::Connection(ConnectionError::new(Reason::ProtocolError)));
            }
        }
        Ok(())
    }

    async fn on_settings_frame(&mut self, head: Head, payload: &[u8]) -> Result<(), DispatchOutcome> {
        if head.stream_id != 0 {
            return Err(conn_err(Reason::ProtocolError));
        }
        const ACK: u8 = 0x1;
        if head.flags & ACK != 0 {
            if !payload.is_empty() {
                return Err(conn_err(Reason::FrameSizeError));
            }
            self.local_settings_acked = true;
            return Ok(());
        }

        let prev_window = self.peer_settings.initial_window_size;
        let settings =
            Settings::parse_payload(payload, self.peer_settings).map_err(|_| conn_err(Reason::ProtocolError))?;
        self.peer_settings = settings.config;

        let delta = self.peer_settings.initial_window_size as i64 - prev_window as i64;
        if delta != 0 {
            for stream in self.streams.iter_mut() {
                stream
                    .send_window
                    .apply_settings_delta(delta)
                    .map_err(|_| conn_err(Reason::FlowControlError))?;
            }
        }
        if let Some(max) = self.peer_settings.max_concurrent_streams {
            self.streams.set_max_concurrent_streams(max);
        }
        self.streams.set_peer_initial_window_size(self.peer_settings.initial_window_size);

        self.send_settings_ack().await.map_err(DispatchOutcome::Connection)
    }

    async fn send_settings_ack(&mut self) -> Result<(), ConnectionError> {
        let mut out = Vec::new();
        let head = Head {
            kind: Kind::Settings,
            flags: 0x1,
            stream_id: 0,
            length: 0,
        };
        head.encode(0, &mut out);
        self.write_raw(&out).await
    }

    async fn on_ping_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
    ) -> Result<(), DispatchOutcome> {
        let ping = Ping::load(head, payload).map_err(|_| conn_err(Reason::FrameSizeError))?;
        callbacks.on_ping(ping.payload, ping.ack).await;
        if ping.ack {
            if matches!(self.pending_ping, Some((expected, _)) if expected == ping.payload) {
                self.pending_ping = None;
            }
        } else {
            let mut out = Vec::new();
            ping.pong().encode(&mut out);
            self.write_raw(&out).await.map_err(DispatchOutcome::Connection)?;
        }
        Ok(())
    }

    async fn on_goaway_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
    ) -> Result<(), DispatchOutcome> {
        let goaway = GoAway::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        self.goaway_received = true;
        callbacks.on_goaway(goaway.last_stream_id, goaway.reason).await;
        Ok(())
    }

    async fn on_window_update_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
    ) -> Result<(), DispatchOutcome> {
        let wu = WindowUpdate::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        if wu.stream_id == 0 {
            self.conn_send_window
                .replenish(wu.increment)
                .map_err(|_| conn_err(Reason::FlowControlError))?;
        } else if let Some(stream) = self.streams.get_mut(wu.stream_id) {
            stream
                .send_window
                .replenish(wu.increment)
                .map_err(|_| StreamError::new(wu.stream_id, Reason::FlowControlError))
                .map_err(DispatchOutcome::Stream)?;
        }
        callbacks.on_window_update(wu.stream_id, wu.increment).await;
        self.flush_deferred_data(wu.stream_id).await.map_err(DispatchOutcome::Connection)
    }

    async fn on_rst_stream_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
    ) -> Result<(), DispatchOutcome> {
        let rst = RstStream::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        if let Some(stream) = self.streams.get_mut(rst.stream_id) {
            stream.state = stream.state.reset();
            stream.error = Some(rst.reason);
        }
        callbacks.on_rst_stream(rst.stream_id, rst.reason).await;
        Ok(())
    }

    async fn on_priority_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
    ) -> Result<(), DispatchOutcome> {
        let prio = Priority::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        self.scheduler
            .set_priority(
                prio.stream_id,
                prio.dependency.dependency_id,
                prio.dependency.weight,
                prio.dependency.is_exclusive,
            )
            .map_err(|_| conn_err(Reason::ProtocolError))?;
        callbacks
            .on_priority(
                prio.stream_id,
                prio.dependency.dependency_id,
                prio.dependency.weight,
                prio.dependency.is_exclusive,
            )
            .await;
        Ok(())
    }

    async fn on_headers_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
        tx: &tokio::sync::mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), DispatchOutcome> {
        let frame = Headers::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;

        self.streams
            .accept_client_stream(frame.stream_id)
            .map_err(|e| {
                if matches!(e, crate::streams::StreamsError::ConcurrencyLimitExceeded) {
                    DispatchOutcome::Stream(StreamError::new(frame.stream_id, e.reason()))
                } else {
                    DispatchOutcome::Connection(ConnectionError::new(e.reason()))
                }
            })?;
        self.highest_processed_stream_id = self.highest_processed_stream_id.max(frame.stream_id);

        if let Some(dep) = frame.priority {
            let _ = self
                .scheduler
                .set_priority(frame.stream_id, dep.dependency_id, dep.weight, dep.is_exclusive);
        }

        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&frame.header_block_fragment);

        if frame.end_headers {
            self.complete_headers(frame.stream_id, buffer.freeze(), frame.end_stream, callbacks, tx)
                .await
        } else {
            self.pending_headers = Some(PendingHeaderBlock {
                stream_id: frame.stream_id,
                buffer,
                end_stream: frame.end_stream,
            });
            Ok(())
        }
    }

    async fn on_continuation_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
        tx: &tokio::sync::mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), DispatchOutcome> {
        let frame = Continuation::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        let pending = self
            .pending_headers
            .as_mut()
            .filter(|p| p.stream_id == frame.stream_id)
            .ok_or_else(|| conn_err(Reason::ProtocolError))?;
        pending.buffer.extend_from_slice(&frame.header_block_fragment);

        if frame.end_headers {
            let PendingHeaderBlock {
                stream_id,
                buffer,
                end_stream,
            } = self.pending_headers.take().unwrap();
            self.complete_headers(stream_id, buffer.freeze(), end_stream, callbacks, tx)
                .await
        } else {
            Ok(())
        }
    }

    async fn complete_headers(
        &mut self,
        stream_id: u32,
        block: Bytes,
        end_stream: bool,
        callbacks: &dyn Callbacks,
        tx: &tokio::sync::mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), DispatchOutcome> {
        let req = conv::decode_request(&mut self.hpack_decoder, &block)
            .map_err(|_| conn_err(Reason::CompressionError))?;

        let stream = self
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| conn_err(Reason::ProtocolError))?;
        stream.state = stream
            .state
            .recv_headers(end_stream)
            .map_err(|_| StreamError::new(stream_id, Reason::ProtocolError))
            .map_err(DispatchOutcome::Stream)?;
        if end_stream {
            stream.state = stream.state.recv_end_stream();
        }

        let handle = StreamHandle {
            stream_id,
            tx: tx.clone(),
        };
        callbacks.on_headers(handle, req, end_stream).await;
        Ok(())
    }

    async fn on_data_frame(
        &mut self,
        head: Head,
        payload: &[u8],
        callbacks: &dyn Callbacks,
        tx: &tokio::sync::mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), DispatchOutcome> {
        let frame = Data::load(head, payload).map_err(|_| conn_err(Reason::ProtocolError))?;
        // Flow control is debited for the whole frame payload — the Pad Length
        // octet and padding included, not just the application data (RFC 7540 §6.9).
        let consumed = head.length;

        self.conn_recv_window
            .consume(consumed)
            .map_err(|_| conn_err(Reason::FlowControlError))?;

        let stream = self
            .streams
            .get_mut(frame.stream_id)
            .ok_or_else(|| StreamError::new(frame.stream_id, Reason::StreamClosed))
            .map_err(DispatchOutcome::Stream)?;
        if !stream.state.can_recv() {
            return Err(DispatchOutcome::Stream(StreamError::new(frame.stream_id, Reason::StreamClosed)));
        }
        stream
            .recv_window
            .consume(consumed)
            .map_err(|_| StreamError::new(frame.stream_id, Reason::FlowControlError))
            .map_err(DispatchOutcome::Stream)?;
        if frame.end_stream {
            stream.state = stream.state.recv_end_stream();
        }
        let stream_recv_window = stream.recv_window.get();

        let handle = StreamHandle {
            stream_id: frame.stream_id,
            tx: tx.clone(),
        };
        callbacks.on_data(handle, frame.data, frame.end_stream).await;

        if self.config.auto_window_update {
            if stream_recv_window < self.config.window_update_threshold as i64 {
                self.send_window_update(frame.stream_id, consumed)
                    .await
                    .map_err(DispatchOutcome::Connection)?;
            }
            if self.conn_recv_window.get() < self.config.window_update_threshold as i64 {
                self.send_window_update(0, consumed).await.map_err(DispatchOutcome::Connection)?;
            }
        }
        Ok(())
    }

    async fn send_window_update(&mut self, stream_id: u32, increment: u32) -> Result<(), ConnectionError> {
        if stream_id == 0 {
            self.conn_recv_window.replenish(increment).ok();
        } else if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.recv_window.replenish(increment).ok();
        }
        let mut out = Vec::new();
        WindowUpdate { stream_id, increment }.encode(&mut out);
        self.write_raw(&out).await
    }

    /// Drains callbacks' queued responses, HPACK-encoding HEADERS and
    /// flow-controlling DATA, deferring whatever doesn't fit the current
    /// window (spec §4.6: "the frame is deferred").
    async fn drain_outbound(
        &mut self,
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<Outbound>,
    ) -> Result<(), ConnectionError> {
        while let Ok(item) = rx.try_recv() {
            match item {
                Outbound::Headers(stream_id, header, end_stream) => {
                    let mut block = Vec::new();
                    conv::encode_response(&mut self.hpack_encoder, &header, &mut block);
                    let mut out = Vec::new();
                    Headers {
                        stream_id,
                        header_block_fragment: Bytes::from(block),
                        end_stream,
                        end_headers: true,
                        priority: None,
                        pad_len: 0,
                    }
                    .encode(&mut out);
                    self.write_raw(&out).await?;
                    if end_stream {
                        if let Some(stream) = self.streams.get_mut(stream_id) {
                            stream.state = stream.state.send_end_stream();
                        }
                    }
                }
                Outbound::Data(stream_id, data, end_stream) => {
                    self.enqueue_data(stream_id, data, end_stream).await?;
                }
                Outbound::RstStream(stream_id, reason) => {
                    if let Some(stream) = self.streams.get_mut(stream_id) {
                        stream.state = stream.state.reset();
                    }
                    let mut out = Vec::new();
                    RstStream { stream_id, reason }.encode(&mut out);
                    self.write_raw(&out).await?;
                }
            }
        }
        Ok(())
    }

    async fn enqueue_data(&mut self, stream_id: u32, data: Bytes, end_stream: bool) -> Result<(), ConnectionError> {
        self.deferred_data
            .entry(stream_id)
            .or_default()
            .push_back((data, end_stream));
        self.scheduler.mark_pending(stream_id);
        self.flush_deferred_data(stream_id).await
    }

    /// Sends as much queued DATA for `stream_id` (or every stream, when
    /// `stream_id == 0`, since a connection-level WINDOW_UPDATE can unblock
    /// all of them) as the current windows allow, splitting frames to fit.
    /// Write order among multiple unblocked streams follows spec §4.6's
    /// priority scheduler rather than arbitrary table order.
    async fn flush_deferred_data(&mut self, stream_id: u32) -> Result<(), ConnectionError> {
        let ids: Vec<u32> = if stream_id == 0 {
            self.scheduler
                .next_order()
                .into_iter()
                .filter(|id| self.deferred_data.contains_key(id))
                .collect()
        } else {
            vec![stream_id]
        };

        for id in ids {
            loop {
                let Some(queue) = self.deferred_data.get_mut(&id) else { break };
                let Some((data, end_stream)) = queue.front().cloned() else { break };

                let stream_window = self
                    .streams
                    .get(id)
                    .map(|s| s.send_window.get())
                    .unwrap_or(0);
                let conn_window = self.conn_send_window.get();
                let available = stream_window.min(conn_window).max(0) as usize;
                if available == 0 {
                    break;
                }

                let send_len = data.len().min(available);
                let chunk = data.slice(0..send_len);
                let is_final_chunk = send_len == data.len();
                let frame_end_stream = is_final_chunk && end_stream;

                let mut out = Vec::new();
                Data {
                    stream_id: id,
                    data: chunk.clone(),
                    end_stream: frame_end_stream,
                    pad_len: 0,
                }
                .encode(&mut out);
                self.write_raw(&out).await?;

                self.conn_send_window.consume(send_len as u32).ok();
                if let Some(stream) = self.streams.get_mut(id) {
                    stream.send_window.consume(send_len as u32).ok();
                    if frame_end_stream {
                        stream.state = stream.state.send_end_stream();
                    }
                }

                let queue = self.deferred_data.get_mut(&id).unwrap();
                if is_final_chunk {
                    queue.pop_front();
                } else {
                    let (front, fe) = queue.front_mut().unwrap();
                    *front = front.slice(send_len..);
                    let _ = fe;
                }
                if self.deferred_data.get(&id).is_some_and(|q| q.is_empty()) {
                    self.deferred_data.remove(&id);
                    self.scheduler.remove_pending(id);
                }
            }
        }
        Ok(())
    }

    async fn reset_stream(&mut self, stream_id: u32, reason: Reason) -> Result<(), ConnectionError> {
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.state = stream.state.reset();
        }
        let mut out = Vec::new();
        RstStream { stream_id, reason }.encode(&mut out);
        self.write_raw(&out).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let dur = self.config.send_timeout;
        let io = &mut self.io;
        weft_core::io::timeout(dur, io.send(bytes), || WeftError::SendTimeout)
            .await
            .and_then(std::convert::identity)
            .map_err(|_| ConnectionError::new(Reason::InternalError))
    }

    /// On a connection-fatal error, attempts a best-effort GOAWAY (spec §7:
    /// "attempt a GOAWAY with best-effort write timeout, then close").
    async fn fail(&mut self, err: ConnectionError) -> ConnectionError {
        if !self.goaway_sent {
            self.goaway_sent = true;
            let mut out = Vec::new();
            GoAway {
                last_stream_id: self.streams.highest_processed_stream_id(),
                reason: err.reason,
                debug_data: Bytes::new(),
            }
            .encode(&mut out);
            let _ = self.write_raw(&out).await;
        }
        err
    }
}

enum DispatchOutcome {
    Stream(StreamError),
    Connection(ConnectionError),
}

impl From<FrameError> for DispatchOutcome {
    fn from(e: FrameError) -> Self {
        DispatchOutcome::Connection(e.into())
    }
}

fn conn_err(reason: Reason) -> DispatchOutcome {
    DispatchOutcome::Connection(ConnectionError::new(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// A fake transport combining `ScriptedIo`'s queued-`recv` replay with
    /// `RecordingIo`'s captured sends, the same two patterns `weft-h1`'s
    /// `reader`/`writer` tests use individually.
    #[derive(Default)]
    struct FakeIo {
        inbound: VecDeque<Vec<u8>>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl AsyncIo for FakeIo {
        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
            match self.inbound.pop_front() {
                Some(mut data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    // `read_head` asks for exactly `FRAME_HEADER_LEN` bytes
                    // at a time regardless of how big a chunk a test queued
                    // here; put back whatever didn't fit this call rather
                    // than requiring every queued chunk to line up with the
                    // caller's buffer size.
                    if n < data.len() {
                        self.inbound.push_front(data.split_off(n));
                    }
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
            self.sent.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    fn client_settings_frame(max_concurrent_streams: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&crate::settings::SETTINGS_MAX_CONCURRENT_STREAMS.to_be_bytes());
        payload.extend_from_slice(&max_concurrent_streams.to_be_bytes());
        let mut out = Vec::new();
        Head {
            kind: Kind::Settings,
            flags: 0,
            stream_id: 0,
            length: payload.len() as u32,
        }
        .encode(payload.len() as u32, &mut out);
        out.extend_from_slice(&payload);
        out
    }

    fn client_headers_frame(stream_id: u32, end_stream: bool) -> Vec<u8> {
        let mut encoder = HpackEncoder::new(4096);
        let req = RequestHeader::new(weft_types::Method::Get, "/", weft_types::Version::Http2);
        let mut block = Vec::new();
        conv::encode_request(&mut encoder, &req, "https", &mut block);
        let mut out = Vec::new();
        Headers {
            stream_id,
            header_block_fragment: Bytes::from(block),
            end_stream,
            end_headers: true,
            priority: None,
            pad_len: 0,
        }
        .encode(&mut out);
        out
    }

    fn window_update_frame(stream_id: u32, increment: u32) -> Vec<u8> {
        let mut out = Vec::new();
        WindowUpdate { stream_id, increment }.encode(&mut out);
        out
    }

    struct EchoCallbacks;

    #[async_trait]
    impl Callbacks for EchoCallbacks {
        async fn on_headers(&self, stream: StreamHandle, _request: RequestHeader, end_stream: bool) {
            if end_stream {
                let mut header = ResponseHeader::new(weft_types::Version::Http2, weft_types::StatusCode::OK);
                header.fields.add("content-length", "2");
                stream.send_headers(header, false);
                stream.send_data(Bytes::from_static(b"ok"), true);
            }
        }

        async fn on_data(&self, _stream: StreamHandle, _data: Bytes, _end_stream: bool) {}
    }

    fn find_frame_headers<'a>(wire: &'a [u8]) -> Vec<(Kind, u32, u8, &'a [u8])> {
        let mut frames = Vec::new();
        let mut rest = wire;
        while rest.len() >= FRAME_HEADER_LEN {
            let head = Head::parse(&rest[..FRAME_HEADER_LEN]).unwrap();
            let len = head.length as usize;
            let payload = &rest[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];
            frames.push((head.kind, head.stream_id, head.flags, payload));
            rest = &rest[FRAME_HEADER_LEN + len..];
        }
        frames
    }

    /// Scenario 4 (spec §8): preface + SETTINGS exchange. The server must
    /// send its own SETTINGS before reading the preface, then ACK the
    /// client's SETTINGS once it arrives.
    #[tokio::test]
    async fn preface_and_settings_exchange_acks_client_settings() {
        let mut io = FakeIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        let sent = io.sent.clone();
        let mut conn = Connection::new(io, ConnectionConfig::default());

        let result = conn.run(&EchoCallbacks).await;
        assert!(result.is_ok(), "clean peer close ends the loop without error");

        let wire = sent.lock().unwrap().clone();
        let frames = find_frame_headers(&wire);
        // First frame out is the server's own SETTINGS (sent before the
        // preface is even read).
        assert_eq!(frames[0].0, Kind::Settings);
        assert_eq!(frames[0].2 & 0x1, 0, "initial SETTINGS must not be an ACK");
        // Second is the ACK of the client's SETTINGS.
        assert_eq!(frames[1].0, Kind::Settings);
        assert_eq!(frames[1].2 & 0x1, 0x1, "must ACK the client's SETTINGS");
        assert!(frames[1].3.is_empty());
    }

    /// Scenario 5 (spec §8): a single GET on stream 1 with END_STREAM
    /// produces a HEADERS+DATA reply with END_STREAM on the DATA frame.
    #[tokio::test]
    async fn single_get_round_trip_replies_with_headers_then_data() {
        let mut io = FakeIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        io.inbound.push_back(client_headers_frame(1, true));
        let sent = io.sent.clone();
        let mut conn = Connection::new(io, ConnectionConfig::default());

        conn.run(&EchoCallbacks).await.unwrap();

        let wire = sent.lock().unwrap().clone();
        let frames = find_frame_headers(&wire);
        let headers_frame = frames.iter().find(|f| f.0 == Kind::Headers).unwrap();
        assert_eq!(headers_frame.1, 1);
        let data_frame = frames.iter().find(|f| f.0 == Kind::Data).unwrap();
        assert_eq!(data_frame.1, 1);
        assert_eq!(data_frame.3, b"ok");
        assert_eq!(data_frame.2 & 0x1, 0x1, "DATA must carry END_STREAM");

        assert_eq!(conn.streams.get(1).unwrap().state, StreamState::Closed);
    }

    /// Scenario 6 (spec §8): a tiny peer window defers part of the DATA,
    /// then a WINDOW_UPDATE lets the rest drain.
    #[tokio::test]
    async fn flow_control_pressure_defers_then_flushes_on_window_update() {
        let mut io = FakeIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        io.inbound.push_back(client_headers_frame(1, true));
        io.inbound.push_back(window_update_frame(1, 12));
        io.inbound.push_back(window_update_frame(0, 12));
        let sent = io.sent.clone();

        struct BigDataCallbacks;
        #[async_trait]
        impl Callbacks for BigDataCallbacks {
            async fn on_headers(&self, stream: StreamHandle, _request: RequestHeader, end_stream: bool) {
                if end_stream {
                    let header = ResponseHeader::new(weft_types::Version::Http2, weft_types::StatusCode::OK);
                    stream.send_headers(header, false);
                    stream.send_data(Bytes::from_static(b"01234567890123456789"), true);
                }
            }
            async fn on_data(&self, _stream: StreamHandle, _data: Bytes, _end_stream: bool) {}
        }

        let mut config = ConnectionConfig::default();
        config.settings.initial_window_size = 8;
        let mut conn = Connection::new(io, config);
        conn.peer_settings.initial_window_size = 8;
        conn.streams.set_peer_initial_window_size(8);
        conn.conn_send_window = Window::new(8);

        conn.run(&BigDataCallbacks).await.unwrap();

        let wire = sent.lock().unwrap().clone();
        let data_bytes: Vec<u8> = find_frame_headers(&wire)
            .into_iter()
            .filter(|f| f.0 == Kind::Data)
            .flat_map(|f| f.3.to_vec())
            .collect();
        assert_eq!(data_bytes, b"01234567890123456789");
    }

    /// A connection-level WINDOW_UPDATE unblocks two streams at once; the
    /// higher-weight stream's DATA must be written first (spec §4.6's
    /// ordering key, not table-iteration order).
    #[tokio::test]
    async fn connection_window_update_flushes_in_priority_order() {
        let mut io = FakeIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        io.inbound.push_back(client_headers_frame(1, true));
        io.inbound.push_back(client_headers_frame(3, true));
        io.inbound.push_back(window_update_frame(0, 100));
        let sent = io.sent.clone();

        struct PriorityCallbacks;
        #[async_trait]
        impl Callbacks for PriorityCallbacks {
            async fn on_headers(&self, stream: StreamHandle, _request: RequestHeader, end_stream: bool) {
                if end_stream {
                    let header = ResponseHeader::new(weft_types::Version::Http2, weft_types::StatusCode::OK);
                    stream.send_headers(header, false);
                    let payload = if stream.stream_id() == 1 { b"low-weight".to_vec() } else { b"hi-weight!".to_vec() };
                    stream.send_data(payload, true);
                }
            }
            async fn on_data(&self, _stream: StreamHandle, _data: Bytes, _end_stream: bool) {}
        }

        // Each stream's own send_window stays ample (the default
        // INITIAL_WINDOW_SIZE); only the connection window is the
        // bottleneck, so a single connection-level WINDOW_UPDATE is what
        // unblocks both streams at once and the scheduler decides order.
        let mut conn = Connection::new(io, ConnectionConfig::default());
        conn.conn_send_window = Window::new(0);
        // Stream 3 gets weight 255 (scheduled first); stream 1 keeps the
        // default weight 16.
        conn.scheduler.set_priority(3, 0, 255, false).unwrap();

        conn.run(&PriorityCallbacks).await.unwrap();

        let wire = sent.lock().unwrap().clone();
        let data_stream_order: Vec<u32> = find_frame_headers(&wire)
            .into_iter()
            .filter(|f| f.0 == Kind::Data)
            .map(|f| f.1)
            .collect();
        assert_eq!(data_stream_order, vec![3, 1], "stream 3's higher weight schedules it first");
    }

    /// A transport that never sees new bytes and never reports a clean
    /// close either — its `recv` future simply never resolves, the way a
    /// genuinely idle peer looks from the server's side. Used to exercise
    /// the idle clock (`auto_ping`/`settings_timeout`) under paused virtual
    /// time instead of a real multi-second sleep.
    #[derive(Default)]
    struct StallingIo {
        inbound: VecDeque<Vec<u8>>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl AsyncIo for StallingIo {
        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
            if let Some(mut data) = self.inbound.pop_front() {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.inbound.push_front(data.split_off(n));
                }
                return Ok(n);
            }
            std::future::pending().await
        }

        async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
            self.sent.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    /// `auto_ping`: an idle connection gets a keepalive PING once
    /// `ping_interval` elapses, and is closed with `NO_ERROR` if that PING
    /// is never ACKed within `ping_timeout` (spec §3's local-tuning knobs).
    #[tokio::test(start_paused = true)]
    async fn auto_ping_sends_keepalive_then_times_out_unacked() {
        let mut io = StallingIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        let sent = io.sent.clone();

        let config = ConnectionConfig {
            settings_timeout: None,
            auto_ping: true,
            ping_interval: Duration::from_millis(100),
            ping_timeout: Duration::from_millis(50),
            ..ConnectionConfig::default()
        };
        let mut conn = Connection::new(io, config);

        let err = conn.run(&EchoCallbacks).await.expect_err("an unresponsive peer must close the connection");
        assert_eq!(err.reason, Reason::NoError);

        let wire = sent.lock().unwrap().clone();
        let frames = find_frame_headers(&wire);
        let ping = frames
            .iter()
            .find(|f| f.0 == Kind::Ping)
            .expect("a keepalive PING must have been sent while the peer was idle");
        assert_eq!(ping.2 & 0x1, 0, "a keepalive PING is not itself an ACK");
    }

    /// A peer that completes the preface/SETTINGS handshake promptly never
    /// sees a keepalive PING fire even though `auto_ping` is on, as long as
    /// it keeps sending frames within `ping_interval` of each other.
    #[tokio::test(start_paused = true)]
    async fn auto_ping_does_not_fire_while_peer_stays_active() {
        let mut io = StallingIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());
        io.inbound.push_back(client_settings_frame(10));
        io.inbound.push_back(client_headers_frame(1, true));
        let sent = io.sent.clone();

        let config = ConnectionConfig {
            settings_timeout: None,
            auto_ping: true,
            ping_interval: Duration::from_secs(3600),
            ping_timeout: Duration::from_secs(10),
            ..ConnectionConfig::default()
        };
        let mut conn = Connection::new(io, config);

        tokio::time::timeout(Duration::from_millis(50), conn.run(&EchoCallbacks))
            .await
            .expect_err("the connection must still be waiting on the (stalled) next frame, not finished");

        let wire = sent.lock().unwrap().clone();
        assert!(
            find_frame_headers(&wire).iter().all(|f| f.0 != Kind::Ping),
            "no keepalive PING should fire before ping_interval elapses"
        );
    }

    /// `settings_timeout`: if the peer never ACKs the server's initial
    /// SETTINGS, the connection fails with `SETTINGS_TIMEOUT` rather than
    /// hanging forever.
    #[tokio::test(start_paused = true)]
    async fn settings_timeout_fires_when_peer_never_acks() {
        let mut io = StallingIo::default();
        io.inbound.push_back(CONNECTION_PREFACE.to_vec());

        let config = ConnectionConfig {
            settings_timeout: Some(Duration::from_millis(50)),
            ..ConnectionConfig::default()
        };
        let mut conn = Connection::new(io, config);

        let err = conn.run(&EchoCallbacks).await.expect_err("a peer that never ACKs SETTINGS must time out");
        assert_eq!(err.reason, Reason::SettingsTimeout);
    }
}
