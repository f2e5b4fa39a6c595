//! End-to-end call scenarios against a scripted SIP peer on localhost UDP.

use bytes::Bytes;
use bytesstr::BytesStr;
use dialout_sip::{CallError, CallOptions, CallState, SipCall, TransportKind};
use parking_lot::Mutex;
use sdp_types::SessionDescription;
use sip_types::msg::{MessageLine, SipMessage};
use sip_types::{Method, Name};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct MockPeer {
    socket: UdpSocket,
    caller: Option<SocketAddr>,
}

impl MockPeer {
    async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            caller: None,
        }
    }

    fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Receive and parse the next SIP message from the caller
    async fn recv(&mut self) -> SipMessage {
        let mut buffer = vec![0u8; 65535];

        let (len, from) = timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for a SIP message")
            .unwrap();

        self.caller = Some(from);

        SipMessage::parse(Bytes::copy_from_slice(&buffer[..len]))
            .expect("peer received an unparseable message")
    }

    /// Receive the next message and assert its method
    async fn recv_expect(&mut self, method: Method) -> SipMessage {
        let msg = self.recv().await;
        assert_eq!(msg.method(), Some(method), "unexpected message from caller");
        msg
    }

    async fn send(&self, text: String) {
        self.socket
            .send_to(text.as_bytes(), self.caller.unwrap())
            .await
            .unwrap();
    }

    /// Build a response to `req`, echoing its Via chain and identity headers
    fn response(
        &self,
        req: &SipMessage,
        code: u16,
        reason: &str,
        to_tag: Option<&str>,
        body: Option<&str>,
        extra: &[&str],
    ) -> String {
        let mut out = format!("SIP/2.0 {code} {reason}\r\n");

        for via in req.headers.get_all(&Name::VIA) {
            out += &format!("Via: {via}\r\n");
        }

        out += &format!("From: {}\r\n", req.headers.get(&Name::FROM).unwrap());

        let to = req.headers.get(&Name::TO).unwrap();
        match to_tag {
            Some(tag) => out += &format!("To: {to};tag={tag}\r\n"),
            None => out += &format!("To: {to}\r\n"),
        }

        out += &format!("Call-ID: {}\r\n", req.headers.get(&Name::CALL_ID).unwrap());
        out += &format!("CSeq: {}\r\n", req.headers.get(&Name::CSEQ).unwrap());
        out += &format!("Contact: <sip:peer@{}>\r\n", self.addr());

        for line in extra {
            out += &format!("{line}\r\n");
        }

        match body {
            Some(body) => {
                out += "Content-Type: application/sdp\r\n";
                out += &format!("Content-Length: {}\r\n\r\n{body}", body.len());
            }
            None => out += "Content-Length: 0\r\n\r\n",
        }

        out
    }

    /// An in-dialog BYE from the peer towards the caller
    fn bye_request(&self, invite: &SipMessage, peer_tag: &str) -> String {
        let caller = invite.headers.get(&Name::FROM).unwrap();
        let callee = invite.headers.get(&Name::TO).unwrap();
        let call_id = invite.headers.get(&Name::CALL_ID).unwrap();

        format!(
            "BYE sip:alice@127.0.0.1 SIP/2.0\r\n\
             Via: SIP/2.0/UDP {};branch=z9hG4bKpeerbye\r\n\
             From: {callee};tag={peer_tag}\r\n\
             To: {caller}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: 1 BYE\r\n\
             Content-Length: 0\r\n\r\n",
            self.addr(),
        )
    }
}

fn sdp_answer(rtp_addr: SocketAddr) -> String {
    format!(
        "v=0\r\n\
         o=- 1 1 IN IP4 {ip}\r\n\
         s=peer\r\n\
         c=IN IP4 {ip}\r\n\
         t=0 0\r\n\
         m=audio {port} RTP/AVP 0 101\r\n\
         a=rtpmap:0 PCMU/8000\r\n\
         a=rtpmap:101 telephone-event/8000\r\n\
         a=sendrecv\r\n",
        ip = rtp_addr.ip(),
        port = rtp_addr.port(),
    )
}

fn call_options(peer: SocketAddr) -> CallOptions {
    CallOptions::new("alice", "secret", peer.to_string(), "bob", TransportKind::Udp)
}

#[derive(Default)]
struct Observed {
    states: Mutex<Vec<CallState>>,
    reasons: Mutex<Vec<String>>,
    dtmf: Mutex<Vec<char>>,
}

fn observe(call: &SipCall) -> Arc<Observed> {
    let observed = Arc::new(Observed::default());

    let o = observed.clone();
    call.on_call_state_changed(move |state| o.states.lock().push(state));

    let o = observed.clone();
    call.on_call_hanged_up(move |reason| o.reasons.lock().push(reason.to_owned()));

    let o = observed.clone();
    call.on_dtmf_received(move |key| o.dtmf.lock().push(key));

    observed
}

fn spawn_call(call: &Arc<SipCall>) -> JoinHandle<Result<(), CallError>> {
    let call = call.clone();
    tokio::spawn(async move { call.start().await })
}

/// The local RTP address announced in the caller's SDP offer
fn offered_rtp_addr(invite: &SipMessage) -> SocketAddr {
    let body = BytesStr::from_utf8_bytes(invite.body.clone()).unwrap();
    let sdp = SessionDescription::parse(&body).unwrap();
    let audio = sdp.audio().unwrap();
    let ip = sdp.connection.as_ref().unwrap().address.clone();

    format!("{}:{}", ip, audio.media.port).parse().unwrap()
}

fn dtmf_packet(seq: u16, timestamp: u32, event: u8, end: bool, duration: u16) -> Vec<u8> {
    let volume = if end { 0x8A } else { 0x0A };
    let payload = vec![event, volume, (duration >> 8) as u8, duration as u8];

    rtp::RtpPacket {
        pt: 101,
        marker: false,
        sequence_number: rtp::SequenceNumber(seq),
        timestamp: rtp::RtpTimestamp(timestamp),
        ssrc: rtp::Ssrc(0xBEEF),
        payload: payload.into(),
    }
    .to_vec()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn happy_path_with_audio_and_teardown() {
    init_logging();

    let mut peer = MockPeer::bind().await;
    let peer_rtp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);
    let handler = call.call_handler();

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;
    assert!(invite.branch().unwrap().starts_with("z9hG4bK"));
    assert!(invite.from_tag().is_some());
    assert_eq!(invite.to_tag(), None);
    assert_eq!(
        invite.headers.get(&Name::CONTENT_TYPE).unwrap(),
        "application/sdp"
    );

    peer.send(peer.response(&invite, 100, "Trying", None, None, &[]))
        .await;
    peer.send(peer.response(&invite, 180, "Ringing", Some("peertag"), None, &[]))
        .await;

    let answer = sdp_answer(peer_rtp.local_addr().unwrap());
    peer.send(peer.response(&invite, 200, "OK", Some("peertag"), Some(&answer), &[]))
        .await;

    // exactly one ACK, promptly, on its own branch, with the peer's tag
    let ack = peer.recv_expect(Method::ACK).await;
    assert_eq!(ack.cseq().unwrap().cseq, invite.cseq().unwrap().cseq);
    assert_eq!(ack.to_tag().unwrap(), "peertag");
    assert_ne!(ack.branch().unwrap(), invite.branch().unwrap());

    // ten frames of caller audio come out as ten paced RTP packets
    handler.play(vec![0x55u8; 160 * 10]).await.unwrap();
    handler.done().await.unwrap();
    handler.wait_played().await.unwrap();

    let mut buffer = [0u8; 2048];
    let mut packets = Vec::new();

    for _ in 0..10 {
        let (len, _) = timeout(RECV_TIMEOUT, peer_rtp.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for RTP")
            .unwrap();

        packets.push(rtp::RtpPacket::parse(Bytes::copy_from_slice(&buffer[..len])).unwrap());
    }

    assert!(packets.iter().all(|p| p.pt == 0 && p.payload.len() == 160));

    for pair in packets.windows(2) {
        assert_eq!(
            pair[1].sequence_number.0,
            pair[0].sequence_number.0.wrapping_add(1)
        );
        assert_eq!(pair[1].timestamp.0, pair[0].timestamp.0.wrapping_add(160));
    }

    // hang up: BYE with a higher CSeq, answered with 200
    let stopper = {
        let call = call.clone();
        tokio::spawn(async move { call.stop("normal").await })
    };

    let bye = peer.recv_expect(Method::BYE).await;
    assert!(bye.cseq().unwrap().cseq > invite.cseq().unwrap().cseq);
    assert_eq!(bye.to_tag().unwrap(), "peertag");

    peer.send(peer.response(&bye, 200, "OK", None, None, &[]))
        .await;

    stopper.await.unwrap();
    runner.await.unwrap().unwrap();

    // after stop no RTP leaves and the audio queue is gone
    assert!(
        timeout(Duration::from_millis(300), peer_rtp.recv_from(&mut buffer))
            .await
            .is_err()
    );
    assert!(matches!(
        handler.play(vec![0u8; 160]).await,
        Err(CallError::AudioStream)
    ));

    // a second stop is a no-op and does not fire callbacks again
    call.stop("again").await;

    assert_eq!(observed.reasons.lock().as_slice(), ["normal"]);
    assert_eq!(
        observed.states.lock().as_slice(),
        [
            CallState::Dialing,
            CallState::Ringing,
            CallState::Answered,
            CallState::Ended
        ]
    );
}

#[tokio::test]
async fn digest_authentication_retries_the_invite() {
    init_logging();

    let mut peer = MockPeer::bind().await;
    let peer_rtp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;
    assert!(invite.headers.get(&Name::AUTHORIZATION).is_none());

    peer.send(peer.response(
        &invite,
        401,
        "Unauthorized",
        Some("authtag"),
        None,
        &["WWW-Authenticate: Digest realm=\"asterisk\", nonce=\"abc\", algorithm=MD5"],
    ))
    .await;

    // ACK for the 401 reuses the INVITE's branch
    let ack = peer.recv_expect(Method::ACK).await;
    assert_eq!(ack.branch().unwrap(), invite.branch().unwrap());

    // the retried INVITE: fresh branch, higher CSeq, Authorization header
    let retry = peer.recv_expect(Method::INVITE).await;
    assert_ne!(retry.branch().unwrap(), invite.branch().unwrap());
    assert!(retry.cseq().unwrap().cseq > invite.cseq().unwrap().cseq);

    let authorization = retry
        .headers
        .get(&Name::AUTHORIZATION)
        .expect("retried INVITE must carry Authorization")
        .to_string();

    let MessageLine::Request(line) = &retry.line else {
        unreachable!()
    };
    let uri = line.uri.to_string();

    let ha1 = format!("{:x}", md5::compute("alice:asterisk:secret"));
    let ha2 = format!("{:x}", md5::compute(format!("INVITE:{uri}")));
    let expected = format!("{:x}", md5::compute(format!("{ha1}:abc:{ha2}")));

    assert!(authorization.contains("username=\"alice\""));
    assert!(authorization.contains("realm=\"asterisk\""));
    assert!(authorization.contains("nonce=\"abc\""));
    assert!(authorization.contains(&format!("uri=\"{uri}\"")));
    assert!(authorization.contains(&format!("response=\"{expected}\"")));
    assert!(authorization.contains("algorithm=MD5"));

    // accept the authenticated INVITE
    let answer = sdp_answer(peer_rtp.local_addr().unwrap());
    peer.send(peer.response(&retry, 200, "OK", Some("peertag"), Some(&answer), &[]))
        .await;

    let ack = peer.recv_expect(Method::ACK).await;
    assert_eq!(ack.to_tag().unwrap(), "peertag");

    // tear down
    let stopper = {
        let call = call.clone();
        tokio::spawn(async move { call.stop("normal").await })
    };

    let bye = peer.recv_expect(Method::BYE).await;
    peer.send(peer.response(&bye, 200, "OK", None, None, &[]))
        .await;

    stopper.await.unwrap();
    runner.await.unwrap().unwrap();

    assert!(observed.states.lock().contains(&CallState::Answered));
}

#[tokio::test]
async fn busy_here_ends_the_call_without_media() {
    init_logging();

    let mut peer = MockPeer::bind().await;

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;
    peer.send(peer.response(&invite, 486, "Busy Here", Some("busytag"), None, &[]))
        .await;

    let ack = peer.recv_expect(Method::ACK).await;
    assert_eq!(ack.branch().unwrap(), invite.branch().unwrap());
    assert_eq!(ack.to_tag().unwrap(), "busytag");

    assert!(matches!(
        runner.await.unwrap(),
        Err(CallError::Busy(code)) if code.into_u16() == 486
    ));

    assert_eq!(call.call_state(), CallState::Busy);
    assert_eq!(observed.reasons.lock().as_slice(), ["Busy Here"]);
    assert!(!observed.states.lock().contains(&CallState::Answered));
}

#[tokio::test]
async fn canceling_while_ringing_sends_cancel_on_the_invite_branch() {
    init_logging();

    let mut peer = MockPeer::bind().await;

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;
    peer.send(peer.response(&invite, 100, "Trying", None, None, &[]))
        .await;
    peer.send(peer.response(&invite, 180, "Ringing", Some("peertag"), None, &[]))
        .await;

    let mut states = call.call_state_changes();
    timeout(RECV_TIMEOUT, states.wait_for(|state| *state == CallState::Ringing))
        .await
        .unwrap()
        .unwrap();

    let stopper = {
        let call = call.clone();
        tokio::spawn(async move { call.stop("user canceled").await })
    };

    let cancel = peer.recv_expect(Method::CANCEL).await;
    assert_eq!(cancel.branch().unwrap(), invite.branch().unwrap());
    assert_eq!(cancel.cseq().unwrap().cseq, invite.cseq().unwrap().cseq);
    assert_eq!(cancel.to_tag(), None);

    peer.send(peer.response(&cancel, 200, "OK", None, None, &[]))
        .await;
    peer.send(peer.response(
        &invite,
        487,
        "Request Terminated",
        Some("peertag"),
        None,
        &[],
    ))
    .await;

    let ack = peer.recv_expect(Method::ACK).await;
    assert_eq!(ack.branch().unwrap(), invite.branch().unwrap());

    stopper.await.unwrap();
    runner.await.unwrap().unwrap();

    assert_eq!(call.call_state(), CallState::Ended);
    assert_eq!(observed.reasons.lock().as_slice(), ["user canceled"]);
}

#[tokio::test]
async fn dtmf_key_press_fires_exactly_once() {
    init_logging();

    let mut peer = MockPeer::bind().await;
    let peer_rtp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);
    let collector = call.dtmf();

    let frames = Arc::new(Mutex::new(Vec::new()));
    {
        let frames = frames.clone();
        call.on_frame_received(move |frame| frames.lock().push(frame.len()));
    }

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;
    let caller_rtp = offered_rtp_addr(&invite);

    let answer = sdp_answer(peer_rtp.local_addr().unwrap());
    peer.send(peer.response(&invite, 200, "OK", Some("peertag"), Some(&answer), &[]))
        .await;

    peer.recv_expect(Method::ACK).await;

    // give the caller's RTP flow a moment to come up after the ACK
    tokio::time::sleep(Duration::from_millis(100)).await;

    // one frame of peer audio lands in the frame monitor and the recording
    let audio = rtp::RtpPacket {
        pt: 0,
        marker: false,
        sequence_number: rtp::SequenceNumber(99),
        timestamp: rtp::RtpTimestamp(5_000),
        ssrc: rtp::Ssrc(0xBEEF),
        payload: vec![0xFFu8; 160].into(),
    };
    peer_rtp.send_to(&audio.to_vec(), caller_rtp).await.unwrap();

    // digit "5" over five packets: two updates, the end packet and two
    // retransmissions of the end packet, all sharing one event timestamp
    let timestamp = 10_000;
    for (seq, end) in [(1, false), (2, false), (3, true), (4, true), (5, true)] {
        peer_rtp
            .send_to(&dtmf_packet(seq, timestamp, 5, end, 800), caller_rtp)
            .await
            .unwrap();
    }

    let keys = timeout(RECV_TIMEOUT, collector.get_dtmf(1))
        .await
        .expect("timed out waiting for DTMF");
    assert_eq!(keys, "5");

    // allow any duplicate event to surface before counting callbacks
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(observed.dtmf.lock().as_slice(), ['5']);

    // the peer hangs up
    peer.send(peer.bye_request(&invite, "peertag")).await;

    let response = peer.recv().await;
    assert_eq!(response.status().map(|code| code.into_u16()), Some(200));
    assert_eq!(response.cseq().unwrap().method, Method::BYE);

    runner.await.unwrap().unwrap();

    assert_eq!(call.call_state(), CallState::Ended);
    assert_eq!(observed.reasons.lock().as_slice(), ["callee hung up"]);

    // the audio frame reached the frame monitor and the recording tap
    assert_eq!(frames.lock().as_slice(), [160]);

    let wav_path = std::env::temp_dir().join("dialout-mock-peer-recorded.wav");
    call.get_recorded_audio(&wav_path).unwrap();

    let reader = hound::WavReader::open(&wav_path).unwrap();
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 160);

    std::fs::remove_file(&wav_path).unwrap();
}

#[tokio::test]
async fn no_common_codec_cancels_the_call() {
    init_logging();

    let mut peer = MockPeer::bind().await;

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));
    let observed = observe(&call);

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;

    let g722_only = "v=0\r\n\
         o=- 1 1 IN IP4 127.0.0.1\r\n\
         s=peer\r\n\
         c=IN IP4 127.0.0.1\r\n\
         t=0 0\r\n\
         m=audio 4000 RTP/AVP 9\r\n\
         a=rtpmap:9 G722/8000\r\n";

    peer.send(peer.response(&invite, 200, "OK", Some("peertag"), Some(g722_only), &[]))
        .await;

    let cancel = peer.recv_expect(Method::CANCEL).await;
    assert_eq!(cancel.branch().unwrap(), invite.branch().unwrap());

    peer.send(peer.response(&cancel, 200, "OK", None, None, &[]))
        .await;
    peer.send(peer.response(
        &invite,
        487,
        "Request Terminated",
        Some("peertag"),
        None,
        &[],
    ))
    .await;

    peer.recv_expect(Method::ACK).await;

    assert!(matches!(
        runner.await.unwrap(),
        Err(CallError::NoSupportedCodec)
    ));
    assert_eq!(call.call_state(), CallState::Failed);
    assert_eq!(observed.reasons.lock().as_slice(), ["no supported codec"]);
}

#[tokio::test]
async fn unanswered_invite_is_retransmitted_over_udp() {
    init_logging();

    let mut peer = MockPeer::bind().await;

    let call = Arc::new(SipCall::new(
        call_options(peer.addr()),
        Handle::current(),
    ));

    let runner = spawn_call(&call);

    let invite = peer.recv_expect(Method::INVITE).await;

    // stay silent: the caller must retransmit on the same branch after T1
    let retransmit = peer.recv_expect(Method::INVITE).await;
    assert_eq!(retransmit.branch().unwrap(), invite.branch().unwrap());
    assert_eq!(retransmit.cseq().unwrap().cseq, invite.cseq().unwrap().cseq);

    peer.send(peer.response(&invite, 486, "Busy Here", Some("busytag"), None, &[]))
        .await;
    peer.recv_expect(Method::ACK).await;

    assert!(matches!(runner.await.unwrap(), Err(CallError::Busy(..))));
}
