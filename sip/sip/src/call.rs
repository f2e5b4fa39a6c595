//! The call orchestrator: binds the SIP dialog to the media engine.

use crate::call_handler::CallHandler;
use crate::config::CallOptions;
use crate::dtmf::{DtmfCollector, DtmfSender, dtmf_channel};
use crate::error::CallError;
use crate::events::{CallEvents, CallState};
use crate::media::{self, MediaSession, RecordingTap};
use crate::wav;
use bytes::Bytes;
use bytesstr::BytesStr;
use parking_lot::Mutex;
use rand::Rng;
use sip_auth::{DigestAuthenticator, DigestCredentials};
use sip_core::transaction::{Transactions, TsxEvent};
use sip_core::transport::{Channel, ChannelRx, ChannelTx};
use sip_types::header::typed::Contact;
use sip_types::msg::{MessageLine, SipMessage};
use sip_types::uri::{NameAddr, SipUri};
use sip_types::{CodeKind, Method, Name, StatusCode};
use sip_ua::{Dialog, DialogState};
use sdp_types::{
    Connection, Fmtp, Media, MediaDescription, MediaType, Origin, RtpMap, SessionDescription,
    Ssrc, TransportProtocol,
};
use std::net::SocketAddr;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long teardown waits for the expected final response (200 to BYE,
/// 487 after CANCEL) before forcing the dialog closed
const HANGUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames the caller can queue ahead of realtime (~10 s)
const INPUT_QUEUE_FRAMES: usize = 512;

enum Command {
    Hangup(String),
}

enum PumpEvent {
    Message(Box<SipMessage>),
    Closed,
}

enum Wake {
    Pump(Option<PumpEvent>),
    Command(Option<Command>),
    Timer,
}

/// An outbound SIP voice call.
///
/// Construction does no I/O; [`SipCall::start`] connects to the proxy,
/// sends the INVITE and drives the dialog until it terminates.
/// [`SipCall::stop`] can be called concurrently from another task and picks
/// the correct teardown for the current dialog state.
pub struct SipCall {
    options: CallOptions,
    runtime: Handle,

    events: Arc<CallEvents>,
    record: Arc<RecordingTap>,

    dtmf: DtmfCollector,
    dtmf_tx: DtmfSender,
    call_handler: CallHandler,
    frames_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    played_tx: watch::Sender<u32>,

    call_state_tx: watch::Sender<CallState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    done_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl SipCall {
    /// Create a call to `options.callee`. The `runtime` handle is where the
    /// call's background activities are spawned; no global executor is
    /// consulted.
    pub fn new(options: CallOptions, runtime: Handle) -> Self {
        let (dtmf_tx, dtmf) = dtmf_channel();
        let (frames_tx, frames_rx) = mpsc::channel(INPUT_QUEUE_FRAMES);
        let (played_tx, played_rx) = watch::channel(0);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (call_state_tx, _) = watch::channel(CallState::Initializing);
        let (done_tx, _) = watch::channel(false);

        let record = Arc::new(RecordingTap::new(options.media.record_capacity));
        let call_handler = CallHandler::new(frames_tx, played_rx, dtmf.clone());

        Self {
            options,
            runtime,
            events: Arc::new(CallEvents::default()),
            record,
            dtmf,
            dtmf_tx,
            call_handler,
            frames_rx: Mutex::new(Some(frames_rx)),
            played_tx,
            call_state_tx,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            done_tx,
            started: AtomicBool::new(false),
        }
    }

    pub fn on_call_state_changed(&self, cb: impl Fn(CallState) + Send + Sync + 'static) {
        self.events.on_state_changed(Box::new(cb));
    }

    pub fn on_call_hanged_up(&self, cb: impl Fn(&str) + Send + Sync + 'static) {
        self.events.on_hanged_up(Box::new(cb));
    }

    pub fn on_dtmf_received(&self, cb: impl Fn(char) + Send + Sync + 'static) {
        self.events.on_dtmf(Box::new(cb));
    }

    pub fn on_frame_received(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.events.on_frame(Box::new(cb));
    }

    pub fn on_amd_state_received(&self, cb: impl Fn(&str) + Send + Sync + 'static) {
        self.events.on_amd(Box::new(cb));
    }

    /// Surface for pushing audio and reading DTMF
    pub fn call_handler(&self) -> CallHandler {
        self.call_handler.clone()
    }

    pub fn dtmf(&self) -> DtmfCollector {
        self.dtmf.clone()
    }

    pub fn call_state(&self) -> CallState {
        *self.call_state_tx.borrow()
    }

    /// Watch call state transitions, mostly useful for tests and UIs
    pub fn call_state_changes(&self) -> watch::Receiver<CallState> {
        self.call_state_tx.subscribe()
    }

    /// Entry point for an external answering machine detector to publish
    /// its verdict to the registered callbacks
    pub fn report_amd_state(&self, state: &str) {
        self.events.emit_amd(state);
    }

    /// Export everything the recording tap currently holds as a WAV file
    /// (mono, 16 bit, 8 kHz)
    pub fn get_recorded_audio(&self, path: impl AsRef<Path>) -> Result<(), CallError> {
        wav::write_wav(path.as_ref(), &self.record.snapshot())?;
        Ok(())
    }

    /// Connect, send the INVITE and run the call until the dialog
    /// terminates. Yields only on I/O and timer waits.
    pub async fn start(&self) -> Result<(), CallError> {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("start invoked more than once");
            return Ok(());
        }

        let result = match Driver::setup(self).await {
            Ok(mut driver) => driver.run().await,
            Err(e) => {
                self.events.emit_state(CallState::Failed);
                self.call_state_tx.send_replace(CallState::Failed);
                self.events.emit_hangup(&e.to_string());
                Err(e)
            }
        };

        self.done_tx.send_replace(true);

        result
    }

    /// Tear the call down.
    ///
    /// Depending on the dialog state this closes the connection, CANCELs
    /// the pending INVITE or BYEs the established session, then waits up to
    /// 5 seconds for the dialog to terminate. Idempotent; only the first
    /// call's reason reaches the hang-up callbacks.
    pub async fn stop(&self, reason: &str) {
        if !self.started.load(Ordering::SeqCst) {
            log::info!("the call was stopped before it was started");
            self.call_state_tx.send_replace(CallState::Ended);
            self.events.emit_state(CallState::Ended);
            self.events.emit_hangup(reason);
            self.done_tx.send_replace(true);
            return;
        }

        if *self.done_tx.borrow() {
            log::warn!("stop invoked on an already terminated call");
            return;
        }

        let _ = self.cmd_tx.send(Command::Hangup(reason.to_owned()));

        let mut done_rx = self.done_tx.subscribe();
        let waited = tokio::time::timeout(
            HANGUP_TIMEOUT + Duration::from_secs(1),
            done_rx.wait_for(|done| *done),
        )
        .await;

        if waited.is_err() {
            log::warn!("the call did not terminate in time");
        }
    }
}

/// Owns every mutable piece of the running call. Dialog and transaction
/// state are touched from here only; the public [`SipCall`] communicates
/// through channels.
struct Driver {
    options: CallOptions,
    runtime: Handle,

    events: Arc<CallEvents>,
    record: Arc<RecordingTap>,
    dtmf_tx: DtmfSender,
    frames_rx: Option<mpsc::Receiver<Bytes>>,
    played_tx: watch::Sender<u32>,
    call_state_tx: watch::Sender<CallState>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,

    channel_tx: ChannelTx,
    pump: JoinHandle<()>,
    msg_rx: mpsc::UnboundedReceiver<PumpEvent>,

    dialog: Dialog,
    transactions: Transactions,
    reliable: bool,

    local_sdp: SessionDescription,
    rtp_addr: SocketAddr,
    early_remote_sdp: Option<SessionDescription>,

    media: Option<MediaSession>,
    last_ack: Option<Bytes>,
    cancel_sent: bool,
    closing_deadline: Option<Instant>,
    hangup_reason: Option<String>,
    error: Option<CallError>,
}

impl Driver {
    async fn setup(call: &SipCall) -> Result<Self, CallError> {
        let options = call.options.clone();

        let channel = Channel::connect(options.transport, &options.proxy).await?;
        let local = channel.local_addr();
        let reliable = options.transport.reliable();

        let proxy_host = options.proxy_host().to_owned();
        let proxy_port = options
            .proxy
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(5060);
        let transport_token = options.transport.sip_name();

        let rtp_port = pick_rtp_port(&options.rtp_port_range);
        let rtp_addr = SocketAddr::new(local.ip(), rtp_port);
        let local_sdp = audio_offer(&local.ip().to_string(), rtp_port, rand::rng().random());

        let mut target = SipUri::new(
            Some(options.callee.as_str().into()),
            proxy_host.as_str(),
            Some(proxy_port),
        );
        target
            .params
            .push("transport", Some(transport_token.into()));

        let local_uri = SipUri::new(Some(options.username.as_str().into()), proxy_host.as_str(), None);
        let local_party = match &options.caller_id {
            Some(name) => NameAddr::new(name.as_str(), local_uri),
            None => NameAddr::uri(local_uri),
        };

        let remote_party = NameAddr::uri(SipUri::new(
            Some(options.callee.as_str().into()),
            proxy_host.as_str(),
            None,
        ));

        let mut contact_uri = SipUri::new(
            Some(options.username.as_str().into()),
            local.ip().to_string(),
            Some(local.port()),
        );
        contact_uri
            .params
            .push("transport", Some(transport_token.into()));
        contact_uri.params.push("ob", None);

        let mut route = SipUri::new(None, proxy_host.as_str(), Some(proxy_port));
        route.params.push("transport", Some(transport_token.into()));
        route.params.push("lr", None);

        let mut dialog = Dialog::new(
            local_party,
            remote_party,
            target,
            Contact::new(NameAddr::uri(contact_uri)),
            options.transport,
            format!("{}:{}", local.ip(), local.port()).into(),
        );
        dialog.route_set = vec![route];

        let (channel_tx, channel_rx) = channel.split();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let pump = call.runtime.spawn(receive_pump(channel_rx, msg_tx));

        let mut driver = Self {
            options,
            runtime: call.runtime.clone(),
            events: call.events.clone(),
            record: call.record.clone(),
            dtmf_tx: call.dtmf_tx.clone(),
            frames_rx: call.frames_rx.lock().take(),
            played_tx: call.played_tx.clone(),
            call_state_tx: call.call_state_tx.clone(),
            cmd_rx: call.cmd_rx.lock().take().expect("start invoked more than once"),
            channel_tx,
            pump,
            msg_rx,
            dialog,
            transactions: Transactions::new(),
            reliable,
            local_sdp,
            rtp_addr,
            early_remote_sdp: None,
            media: None,
            last_ack: None,
            cancel_sent: false,
            closing_deadline: None,
            hangup_reason: None,
            error: None,
        };

        driver.send_invite(None).await?;

        Ok(driver)
    }

    async fn run(&mut self) -> Result<(), CallError> {
        loop {
            if self.dialog.state() == DialogState::Terminated {
                break;
            }

            if let Some(deadline) = self.closing_deadline {
                if Instant::now() >= deadline {
                    log::warn!("teardown response did not arrive in time, forcing close");
                    break;
                }
            }

            let wakeup = self
                .transactions
                .next_wakeup()
                .map(Instant::from_std)
                .into_iter()
                .chain(self.closing_deadline)
                .min();

            let wake = tokio::select! {
                event = self.msg_rx.recv() => Wake::Pump(event),
                command = self.cmd_rx.recv() => Wake::Command(command),
                _ = sleep_until_or_forever(wakeup) => Wake::Timer,
            };

            match wake {
                Wake::Pump(Some(PumpEvent::Message(msg))) => {
                    if let Err(e) = self.handle_message(*msg).await {
                        log::warn!("failed to handle message: {e}");
                    }
                }
                Wake::Pump(Some(PumpEvent::Closed) | None) => {
                    self.fail(
                        CallError::Core(sip_core::Error::ChannelClosed),
                        CallState::Failed,
                        "TransportError",
                    );
                    self.dialog.set_state(DialogState::Terminated);
                }
                Wake::Command(Some(Command::Hangup(reason))) => {
                    self.handle_hangup(reason).await;
                }
                Wake::Command(None) => {
                    // the owning SipCall is gone, shut down hard
                    self.dialog.set_state(DialogState::Terminated);
                }
                Wake::Timer => {
                    self.drive_transactions().await;
                }
            }
        }

        self.shutdown().await;

        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn send_invite(&mut self, authorization: Option<(Name, String)>) -> Result<(), CallError> {
        let offer = Bytes::from(self.local_sdp.to_string());
        let (mut invite, key) = self.dialog.create_invite(offer);

        if let Some((name, value)) = authorization {
            invite.headers.insert(name, value);
        }

        let bytes = invite.print();

        self.transactions.add(
            key.branch,
            key.method,
            self.dialog.cseq_current(),
            bytes.clone(),
            self.reliable,
            std::time::Instant::now(),
        );

        self.channel_tx.send(&bytes).await?;

        self.dialog.set_state(DialogState::Initial);
        self.set_call_state(CallState::Dialing);

        log::info!("sent INVITE for call {}", self.dialog.call_id.0);

        Ok(())
    }

    async fn handle_message(&mut self, msg: SipMessage) -> Result<(), CallError> {
        if msg.call_id()? != self.dialog.call_id {
            return Ok(());
        }

        if msg.is_request() {
            return self.handle_request(msg).await;
        }

        let cseq = msg.cseq()?;

        let Some(status) = msg.status() else {
            return Ok(());
        };

        if let Some(branch) = msg.branch() {
            self.transactions
                .on_response(&branch, &cseq.method, status.kind(), std::time::Instant::now());
        }

        match cseq.method {
            Method::INVITE => self.handle_invite_response(msg, status).await?,
            Method::BYE => {
                if status.is_final() {
                    self.dialog.set_state(DialogState::Terminated);
                }
            }
            Method::CANCEL => {
                // 200 for CANCEL, the dialog ends with the 487 to the INVITE
            }
            _ => {}
        }

        Ok(())
    }

    async fn handle_request(&mut self, msg: SipMessage) -> Result<(), CallError> {
        let Some(method) = msg.method() else {
            return Ok(());
        };

        match method {
            Method::BYE => {
                log::info!("callee hung up");

                self.dialog.remote_cseq = msg.cseq().ok().map(|cseq| cseq.cseq);

                let response = self.dialog.create_response(&msg, StatusCode::OK);
                self.channel_tx.send(&response.print()).await?;

                self.stop_media().await;
                self.set_call_state(CallState::Ended);
                if self.hangup_reason.is_none() {
                    self.hangup_reason = Some("callee hung up".to_owned());
                }
                self.dialog.set_state(DialogState::Terminated);
            }
            Method::OPTIONS => {
                let response = self.dialog.create_response(&msg, StatusCode::OK);
                self.channel_tx.send(&response.print()).await?;
            }
            _ => {
                log::debug!("ignoring in-dialog {method} request");
            }
        }

        Ok(())
    }

    async fn handle_invite_response(
        &mut self,
        msg: SipMessage,
        status: StatusCode,
    ) -> Result<(), CallError> {
        match status.kind() {
            CodeKind::Provisional => {
                if let Some(tag) = msg.to_tag() {
                    if self.dialog.remote_tag.is_none() {
                        self.dialog.remote_tag = Some(tag);
                    }

                    self.dialog.set_state(DialogState::Early);
                }

                if status == StatusCode::RINGING {
                    self.set_call_state(CallState::Ringing);
                }

                // early media answer, some peers only send SDP here
                if !msg.body.is_empty() {
                    self.early_remote_sdp = parse_sdp_body(&msg.body);
                }

                self.dialog.auth_retries = 0;
            }
            CodeKind::Success => self.handle_invite_success(msg).await?,
            _ => self.handle_invite_failure(msg, status).await?,
        }

        Ok(())
    }

    async fn handle_invite_success(&mut self, msg: SipMessage) -> Result<(), CallError> {
        if self.dialog.state() == DialogState::Confirmed {
            // retransmitted 2xx, answer with the same ACK again
            if let Some(ack) = self.last_ack.clone() {
                self.channel_tx.send(&ack).await?;
            }

            return Ok(());
        }

        if self.dialog.state() == DialogState::Terminated || self.cancel_sent {
            return Ok(());
        }

        if let Some(tag) = msg.to_tag() {
            self.dialog.remote_tag = Some(tag);
        }

        let remote_sdp = parse_sdp_body(&msg.body).or_else(|| self.early_remote_sdp.take());

        let negotiated = remote_sdp.as_ref().and_then(|sdp| media::negotiate(sdp).ok());

        let Some(negotiated) = negotiated else {
            // unusable answer: cancel before acknowledging anything
            log::error!("2xx carried no usable media description, canceling");
            self.fail(CallError::NoSupportedCodec, CallState::Failed, "no supported codec");
            self.send_cancel().await?;
            return Ok(());
        };

        // ACK first, the media engine may only run afterwards
        let (ack, _key) = self.dialog.create_ack();
        let ack_bytes = ack.print();
        self.channel_tx.send(&ack_bytes).await?;
        self.last_ack = Some(ack_bytes);

        self.dialog.auth_retries = 0;
        self.dialog.set_state(DialogState::Confirmed);
        self.set_call_state(CallState::Answered);

        log::info!("call answered, starting media");

        let Some(frames_rx) = self.frames_rx.take() else {
            return Ok(());
        };

        let mut session = MediaSession::new(
            self.options.media,
            negotiated,
            self.rtp_addr,
            self.runtime.clone(),
            frames_rx,
            self.played_tx.clone(),
            self.record.clone(),
            self.events.clone(),
            self.dtmf_tx.clone(),
        );

        if let Err(e) = session.start().await {
            log::error!("failed to start media session: {e}");
            self.fail(CallError::Io(e), CallState::Failed, "media start failed");
            self.send_bye().await?;
            return Ok(());
        }

        self.media = Some(session);

        Ok(())
    }

    async fn handle_invite_failure(
        &mut self,
        msg: SipMessage,
        status: StatusCode,
    ) -> Result<(), CallError> {
        if self.dialog.remote_tag.is_none() {
            self.dialog.remote_tag = msg.to_tag();
        }

        let ack = self.dialog.create_ack_for_failure();
        self.channel_tx.send(&ack.print()).await?;

        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED
        ) {
            return self.handle_auth_challenge(msg).await;
        }

        let reason = reason_for(&msg, status);

        match status {
            StatusCode::BUSY_HERE | StatusCode::BUSY_EVERYWHERE | StatusCode::DECLINE => {
                self.fail(CallError::Busy(status), CallState::Busy, &reason);
            }
            StatusCode::REQUEST_TERMINATED if self.cancel_sent => {
                // the 487 we asked for with CANCEL
                self.set_call_state(CallState::Ended);
            }
            StatusCode::NOT_FOUND
            | StatusCode::TEMPORARILY_UNAVAILABLE
            | StatusCode::REQUEST_TIMEOUT => {
                self.fail(CallError::CalleeUnreachable(status), CallState::Failed, &reason);
            }
            _ => {
                self.fail(CallError::Failed(status), CallState::Failed, &reason);
            }
        }

        self.dialog.set_state(DialogState::Terminated);

        Ok(())
    }

    async fn handle_auth_challenge(&mut self, msg: SipMessage) -> Result<(), CallError> {
        // the challenge's to-tag must not leak into the next attempt
        self.dialog.remote_tag = None;

        if self.dialog.auth_retries >= Dialog::AUTH_RETRY_MAX {
            log::error!("exhausted digest authentication retries");
            self.fail(
                CallError::AuthFailed,
                CallState::Failed,
                "unable to authenticate, check credentials",
            );
            self.dialog.set_state(DialogState::Terminated);
            return Ok(());
        }

        let Ok(Some((challenge, is_proxy))) = msg.digest_challenge() else {
            log::error!("401/407 without a usable digest challenge");
            self.fail(
                CallError::AuthFailed,
                CallState::Failed,
                "unable to authenticate, check credentials",
            );
            self.dialog.set_state(DialogState::Terminated);
            return Ok(());
        };

        let authenticator = DigestAuthenticator::new(DigestCredentials::new(
            self.options.username.as_str(),
            self.options.password.as_str(),
        ));

        let authorization = match authenticator.authorize(
            &Method::INVITE,
            &self.dialog.target.to_string(),
            &challenge,
        ) {
            Ok(authorization) => authorization,
            Err(e) => {
                self.fail(CallError::Auth(e), CallState::Failed, "unable to authenticate");
                self.dialog.set_state(DialogState::Terminated);
                return Ok(());
            }
        };

        let name = if is_proxy {
            Name::PROXY_AUTHORIZATION
        } else {
            Name::AUTHORIZATION
        };

        self.dialog.auth_retries += 1;

        log::info!("answering digest challenge for realm {}", challenge.realm);

        self.send_invite(Some((name, authorization.to_string())))
            .await
    }

    async fn handle_hangup(&mut self, reason: String) {
        if self.hangup_reason.is_none() {
            self.hangup_reason = Some(reason);
        }

        match self.dialog.state() {
            DialogState::PreDialog => {
                self.set_call_state(CallState::Ended);
                self.dialog.set_state(DialogState::Terminated);
            }
            DialogState::Initial | DialogState::Early => {
                if let Err(e) = self.send_cancel().await {
                    log::warn!("failed to send CANCEL: {e}");
                    self.dialog.set_state(DialogState::Terminated);
                }
            }
            DialogState::Confirmed => {
                // stop media before any signaling leaves
                self.stop_media().await;

                if let Err(e) = self.send_bye().await {
                    log::warn!("failed to send BYE: {e}");
                    self.dialog.set_state(DialogState::Terminated);
                }

                self.set_call_state(CallState::Ended);
            }
            DialogState::Terminated => {
                log::warn!("the call was already terminated, stop invoked more than once");
            }
        }
    }

    async fn send_cancel(&mut self) -> Result<(), CallError> {
        if self.cancel_sent {
            return Ok(());
        }

        let (cancel, key) = self.dialog.create_cancel();
        let bytes = cancel.print();

        self.transactions.add(
            key.branch,
            key.method,
            self.dialog.cseq_current(),
            bytes.clone(),
            self.reliable,
            std::time::Instant::now(),
        );

        self.channel_tx.send(&bytes).await?;

        self.cancel_sent = true;
        self.closing_deadline = Some(Instant::now() + HANGUP_TIMEOUT);

        log::info!("sent CANCEL");

        Ok(())
    }

    async fn send_bye(&mut self) -> Result<(), CallError> {
        let (bye, key) = self.dialog.create_bye();
        let bytes = bye.print();

        self.transactions.add(
            key.branch,
            key.method,
            self.dialog.cseq_current(),
            bytes.clone(),
            self.reliable,
            std::time::Instant::now(),
        );

        self.channel_tx.send(&bytes).await?;

        self.closing_deadline = Some(Instant::now() + HANGUP_TIMEOUT);

        log::info!("sent BYE");

        Ok(())
    }

    async fn drive_transactions(&mut self) {
        let events = self.transactions.drive(std::time::Instant::now());

        for event in events {
            match event {
                TsxEvent::Retransmit(key) => {
                    let Some(request) = self.transactions.get(&key).map(|tsx| tsx.request().clone())
                    else {
                        continue;
                    };

                    log::debug!("retransmitting {} request", key.method);

                    if let Err(e) = self.channel_tx.send(&request).await {
                        log::warn!("retransmission failed: {e}");
                    }
                }
                TsxEvent::TimedOut(key) => {
                    log::warn!("{} transaction timed out", key.method);

                    if Some(&key) == self.dialog.invite_key() {
                        self.fail(
                            CallError::CalleeUnreachable(StatusCode::REQUEST_TIMEOUT),
                            CallState::Failed,
                            "request timed out",
                        );
                    }

                    // for BYE/CANCEL the closing deadline already runs; a
                    // timed out INVITE ends the dialog outright
                    if key.method == Method::INVITE {
                        self.dialog.set_state(DialogState::Terminated);
                    }
                }
            }
        }
    }

    async fn stop_media(&mut self) {
        if let Some(mut media) = self.media.take() {
            media.stop().await;
        }
    }

    /// Record a terminal error with its user visible state and hang-up
    /// reason. The first recorded error and reason win.
    fn fail(&mut self, error: CallError, state: CallState, reason: &str) {
        if self.error.is_none() {
            self.error = Some(error);
        }

        if self.hangup_reason.is_none() {
            self.hangup_reason = Some(reason.to_owned());
        }

        self.set_call_state(state);
    }

    fn set_call_state(&mut self, state: CallState) {
        let current = *self.call_state_tx.borrow();

        if current == state || current.is_terminal() {
            return;
        }

        log::debug!("call state {current} -> {state}");

        self.call_state_tx.send_replace(state);
        self.events.emit_state(state);
    }

    async fn shutdown(&mut self) {
        // teardown order: media first, then the signaling channel
        self.stop_media().await;

        self.channel_tx.close().await;
        self.pump.abort();

        self.dialog.set_state(DialogState::Terminated);

        if !self.call_state_tx.borrow().is_terminal() {
            self.set_call_state(CallState::Ended);
        }

        let reason = self
            .hangup_reason
            .take()
            .or_else(|| self.error.as_ref().map(|e| e.to_string()))
            .unwrap_or_else(|| "normal".to_owned());

        log::info!("call finished: {reason}");

        self.events.emit_hangup(&reason);
    }
}

async fn receive_pump(mut channel_rx: ChannelRx, msg_tx: mpsc::UnboundedSender<PumpEvent>) {
    loop {
        match channel_rx.recv().await {
            Ok(bytes) => match SipMessage::parse(bytes) {
                Ok(msg) => {
                    if msg_tx.send(PumpEvent::Message(Box::new(msg))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // drop silently, the sender's transaction will retransmit
                    log::warn!("dropping malformed message: {e}");
                }
            },
            Err(sip_core::Error::MalformedMessage) => {
                log::warn!("dropping unframeable data on the channel");
            }
            Err(_) => {
                let _ = msg_tx.send(PumpEvent::Closed);
                break;
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn pick_rtp_port(range: &Range<u16>) -> u16 {
    let port = rand::rng().random_range(range.clone());

    // RTP convention: even ports carry media, odd ones would be RTCP
    port & !1
}

fn reason_for(msg: &SipMessage, status: StatusCode) -> String {
    if let MessageLine::Status(line) = &msg.line {
        if !line.reason.is_empty() {
            return line.reason.to_string();
        }
    }

    status
        .reason_phrase()
        .map(str::to_owned)
        .unwrap_or_else(|| status.to_string())
}

fn parse_sdp_body(body: &Bytes) -> Option<SessionDescription> {
    let body = BytesStr::from_utf8_bytes(body.clone()).ok()?;

    match SessionDescription::parse(&body) {
        Ok(sdp) => Some(sdp),
        Err(e) => {
            log::warn!("ignoring unparseable sdp body: {e}");
            None
        }
    }
}

/// The audio offer sent with the INVITE: PCMU and PCMA plus
/// telephone-event, exactly the codecs the media engine speaks
fn audio_offer(local_ip: &str, rtp_port: u16, ssrc: u32) -> SessionDescription {
    let session_id = u64::from(rand::rng().random::<u32>());

    SessionDescription {
        origin: Origin {
            username: "-".into(),
            session_id,
            session_version: session_id,
            address: local_ip.to_owned().into(),
        },
        name: "dialout".into(),
        connection: Some(Connection {
            address: local_ip.to_owned().into(),
        }),
        media_descriptions: vec![MediaDescription {
            media: Media {
                media_type: MediaType::Audio,
                port: rtp_port,
                proto: TransportProtocol::RtpAvp,
                fmts: vec![0, 8, 101],
            },
            connection: None,
            direction: sdp_types::Direction::SendRecv,
            rtpmap: vec![
                RtpMap {
                    payload: 0,
                    encoding: "PCMU".into(),
                    clock_rate: 8000,
                    params: None,
                },
                RtpMap {
                    payload: 8,
                    encoding: "PCMA".into(),
                    clock_rate: 8000,
                    params: None,
                },
                RtpMap {
                    payload: 101,
                    encoding: "telephone-event".into(),
                    clock_rate: 8000,
                    params: None,
                },
            ],
            fmtp: vec![Fmtp {
                payload: 101,
                params: "0-15".into(),
            }],
            ssrc: Some(Ssrc {
                ssrc,
                attribute: None,
            }),
            attributes: vec![],
        }],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rtp_ports_are_even_and_in_range() {
        for _ in 0..100 {
            let port = pick_rtp_port(&(10000..20000));

            assert_eq!(port % 2, 0);
            assert!((10000..20000).contains(&port));
        }
    }

    #[test]
    fn audio_offer_matches_the_template() {
        let sdp = audio_offer("192.0.2.5", 10020, 1881694713);
        let printed = sdp.to_string();

        assert!(printed.starts_with("v=0\r\n"));
        assert!(printed.contains("c=IN IP4 192.0.2.5\r\n"));
        assert!(printed.contains("t=0 0\r\n"));
        assert!(printed.contains("m=audio 10020 RTP/AVP 0 8 101\r\n"));
        assert!(printed.contains("a=rtpmap:0 PCMU/8000\r\n"));
        assert!(printed.contains("a=rtpmap:8 PCMA/8000\r\n"));
        assert!(printed.contains("a=rtpmap:101 telephone-event/8000\r\n"));
        assert!(printed.contains("a=fmtp:101 0-15\r\n"));
        assert!(printed.contains("a=sendrecv\r\n"));
        assert!(printed.contains("a=ssrc:1881694713\r\n"));
    }
}
