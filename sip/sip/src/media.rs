//! The RTP media engine: paced send loop, receive/demux loop, DTMF decode
//! and the recording tap.

use crate::config::MediaConfig;
use crate::dtmf::DtmfSender;
use crate::error::CallError;
use crate::events::CallEvents;
use bytes::Bytes;
use parking_lot::Mutex;
use rtp::{Packetizer, RtpPacket, TelephoneEvent};
use sdp_types::SessionDescription;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

/// Samples (= bytes for G.711) per 20 ms frame at 8 kHz
pub(crate) const FRAME_SIZE: usize = 160;

const CLOCK_RATE: u32 = 8000;

/// How long the loops block at most, so cancellation is picked up quickly
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// The audio codec negotiated for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Pcmu,
    Pcma,
}

impl CodecKind {
    pub fn payload_type(self) -> u8 {
        match self {
            CodecKind::Pcmu => 0,
            CodecKind::Pcma => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecKind::Pcmu => "PCMU",
            CodecKind::Pcma => "PCMA",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("PCMU") {
            Some(CodecKind::Pcmu)
        } else if name.eq_ignore_ascii_case("PCMA") {
            Some(CodecKind::Pcma)
        } else {
            None
        }
    }

    fn decode_sample(self, sample: u8) -> i16 {
        match self {
            CodecKind::Pcmu => g711::mulaw::decode(sample),
            CodecKind::Pcma => g711::alaw::decode(sample),
        }
    }
}

/// Media parameters agreed on through the SDP offer/answer
#[derive(Debug, Clone)]
pub(crate) struct NegotiatedMedia {
    pub(crate) codec: CodecKind,
    pub(crate) dtmf_payload_type: Option<u8>,
    pub(crate) peer_addr: SocketAddr,
}

/// Pick the codec and peer address from the remote's SDP.
///
/// The first remote payload type we support wins, so the remote's
/// preference order is honored. The selected payload type is guaranteed to
/// be part of the remote's offer.
pub(crate) fn negotiate(remote: &SessionDescription) -> Result<NegotiatedMedia, CallError> {
    let audio = remote.audio().ok_or(CallError::NoSupportedCodec)?;

    let address = remote
        .connection_for(audio)
        .map(|connection| connection.address.as_str())
        .ok_or(CallError::NoSupportedCodec)?;

    let peer_addr = format!("{}:{}", address, audio.media.port)
        .parse()
        .map_err(|_| CallError::NoSupportedCodec)?;

    let mut codec = None;

    for &payload_type in &audio.media.fmts {
        let candidate = match audio.rtpmap_for(payload_type) {
            Some(rtpmap) if rtpmap.clock_rate == CLOCK_RATE => {
                CodecKind::from_name(&rtpmap.encoding)
            }
            Some(_) => None,
            // static payload type numbers need no rtpmap
            None if payload_type == 0 => Some(CodecKind::Pcmu),
            None if payload_type == 8 => Some(CodecKind::Pcma),
            None => None,
        };

        if let Some(candidate) = candidate {
            codec = Some(candidate);
            break;
        }
    }

    let codec = codec.ok_or(CallError::NoSupportedCodec)?;

    let dtmf_payload_type = audio
        .rtpmap
        .iter()
        .find(|rtpmap| rtpmap.encoding.eq_ignore_ascii_case("telephone-event"))
        .map(|rtpmap| rtpmap.payload)
        .or_else(|| audio.media.fmts.contains(&101).then_some(101));

    Ok(NegotiatedMedia {
        codec,
        dtmf_payload_type,
        peer_addr,
    })
}

/// Bounded recording ring, oldest frames are dropped on overflow.
///
/// Written by the media receive loop, snapshotted at WAV export time.
pub(crate) struct RecordingTap {
    frames: Mutex<VecDeque<Vec<i16>>>,
    capacity: usize,
}

impl RecordingTap {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn push_frame(&self, frame: Vec<i16>) {
        let mut frames = self.frames.lock();

        if frames.len() == self.capacity {
            frames.pop_front();
        }

        frames.push_back(frame);
    }

    pub(crate) fn snapshot(&self) -> Vec<i16> {
        self.frames.lock().iter().flatten().copied().collect()
    }
}

/// A running RTP session for one call.
///
/// `start` binds and connects the UDP flow and spawns the send and receive
/// loops; `stop` cancels both cooperatively and waits for them.
pub(crate) struct MediaSession {
    config: MediaConfig,
    media: NegotiatedMedia,
    local_addr: SocketAddr,

    runtime: Handle,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,

    frames_rx: Option<mpsc::Receiver<Bytes>>,
    played_tx: watch::Sender<u32>,
    record: Arc<RecordingTap>,
    events: Arc<CallEvents>,
    dtmf_tx: DtmfSender,
}

impl MediaSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: MediaConfig,
        media: NegotiatedMedia,
        local_addr: SocketAddr,
        runtime: Handle,
        frames_rx: mpsc::Receiver<Bytes>,
        played_tx: watch::Sender<u32>,
        record: Arc<RecordingTap>,
        events: Arc<CallEvents>,
        dtmf_tx: DtmfSender,
    ) -> Self {
        Self {
            config,
            media,
            local_addr,
            runtime,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
            frames_rx: Some(frames_rx),
            played_tx,
            record,
            events,
            dtmf_tx,
        }
    }

    pub(crate) async fn start(&mut self) -> io::Result<()> {
        let socket = UdpSocket::bind(self.local_addr).await?;
        socket.connect(self.media.peer_addr).await?;

        log::info!(
            "media session {} -> {} using {}",
            socket.local_addr()?,
            self.media.peer_addr,
            self.media.codec.name()
        );

        let socket = Arc::new(socket);
        self.running.store(true, Ordering::SeqCst);

        let frames_rx = self
            .frames_rx
            .take()
            .expect("media session started more than once");

        self.tasks.push(self.runtime.spawn(send_loop(
            socket.clone(),
            frames_rx,
            Packetizer::new(self.media.codec.payload_type()),
            self.config.pace_factor,
            self.running.clone(),
            self.played_tx.clone(),
        )));

        self.tasks.push(self.runtime.spawn(recv_loop(
            socket,
            self.media.clone(),
            self.running.clone(),
            self.record.clone(),
            self.events.clone(),
            self.dtmf_tx.clone(),
        )));

        Ok(())
    }

    /// Cooperative shutdown: clears the running flag and waits for both
    /// loops to observe it. Safe to call repeatedly.
    pub(crate) async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

async fn send_loop(
    socket: Arc<UdpSocket>,
    mut frames_rx: mpsc::Receiver<Bytes>,
    mut packetizer: Packetizer,
    pace_factor: f32,
    running: Arc<AtomicBool>,
    played_tx: watch::Sender<u32>,
) {
    let period = Duration::from_secs_f64(FRAME_SIZE as f64 / f64::from(CLOCK_RATE));

    while running.load(Ordering::SeqCst) {
        let frame = match timeout(POLL_TIMEOUT, frames_rx.recv()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(frame)) => frame,
        };

        if frame.is_empty() {
            // sentinel: everything queued before it has been sent
            played_tx.send_modify(|generation| *generation += 1);
            continue;
        }

        let t0 = Instant::now();

        let packet = packetizer.next_packet(frame);

        if let Err(e) = socket.send(&packet.to_vec()).await {
            if running.load(Ordering::SeqCst) {
                log::error!("RTP send failed: {e}");
            }
            break;
        }

        sleep(period.saturating_sub(t0.elapsed()).mul_f32(pace_factor)).await;
    }

    log::debug!("media send loop finished");
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    media: NegotiatedMedia,
    running: Arc<AtomicBool>,
    record: Arc<RecordingTap>,
    events: Arc<CallEvents>,
    dtmf_tx: DtmfSender,
) {
    let mut buffer = vec![0u8; 2048];

    // deduplicates the retransmitted end-of-event packets of one key press
    let mut last_event_timestamp = None;

    while running.load(Ordering::SeqCst) {
        let received = match timeout(POLL_TIMEOUT, socket.recv(&mut buffer)).await {
            Err(_) => continue,
            Ok(Err(e)) => {
                if running.load(Ordering::SeqCst) {
                    log::error!("RTP recv failed: {e}");
                }
                break;
            }
            Ok(Ok(len)) => len,
        };

        let packet = match RtpPacket::parse(Bytes::copy_from_slice(&buffer[..received])) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("dropping invalid RTP packet: {e}");
                continue;
            }
        };

        if media.dtmf_payload_type == Some(packet.pt) {
            handle_telephone_event(&packet, &mut last_event_timestamp, &events, &dtmf_tx);
        } else {
            let samples = packet
                .payload
                .iter()
                .map(|&sample| media.codec.decode_sample(sample))
                .collect();

            record.push_frame(samples);
            events.emit_frame(&packet.payload);
        }
    }

    log::debug!("media receive loop finished");
}

fn handle_telephone_event(
    packet: &RtpPacket,
    last_event_timestamp: &mut Option<u32>,
    events: &CallEvents,
    dtmf_tx: &DtmfSender,
) {
    let event = match TelephoneEvent::parse(&packet.payload) {
        Ok(event) => event,
        Err(e) => {
            log::debug!("dropping invalid telephone-event packet: {e}");
            return;
        }
    };

    // a key press ends with a run of end-bit packets sharing one timestamp,
    // only the first of them fires the event
    if !event.end || *last_event_timestamp == Some(packet.timestamp.0) {
        return;
    }

    *last_event_timestamp = Some(packet.timestamp.0);

    let Some(key) = event.key() else {
        log::debug!("ignoring telephone-event {}", event.event);
        return;
    };

    log::debug!("received DTMF key {key}");

    dtmf_tx.send(key);
    events.emit_dtmf(key);
}
