use crate::util::{Counter, generate_call_id, generate_tag};
use bytes::Bytes;
use bytesstr::BytesStr;
use sip_core::transaction::{TsxKey, generate_branch};
use sip_core::transport::TransportKind;
use sip_types::header::typed::{CSeq, CallId, Contact, ContentType, FromTo, MaxForwards, Via};
use sip_types::msg::{Request, Response, SipMessage};
use sip_types::uri::{NameAddr, SipUri};
use sip_types::{Method, Name, StatusCode};
use std::time::Duration;
use tokio::sync::watch;

const CONTENT_TYPE_SDP: ContentType = ContentType::from_static("application/sdp");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DialogState {
    /// Nothing has been sent yet
    PreDialog,
    /// INVITE is out, no response with a to-tag seen
    Initial,
    /// Provisional response carried a to-tag
    Early,
    /// 2xx received and acknowledged
    Confirmed,
    Terminated,
}

/// UAC dialog for a single outbound INVITE session.
///
/// All requests of the call are built through this type so the dialog
/// invariants hold: the local CSeq strictly increases, every request gets a
/// fresh `z9hG4bK` branch except ACKs for failure responses and CANCEL,
/// which reuse the INVITE's branch.
#[derive(Debug)]
pub struct Dialog {
    pub call_id: CallId,
    pub local_tag: BytesStr,
    pub remote_tag: Option<BytesStr>,

    /// Local party, printed into From
    pub local_addr: NameAddr,
    /// Remote party, printed into To
    pub remote_addr: NameAddr,
    /// Request-URI for new requests
    pub target: SipUri,
    pub contact: Contact,

    /// Preloaded route the ACK for 2xx travels over (the proxy)
    pub route_set: Vec<SipUri>,

    pub transport: TransportKind,
    /// `host:port` printed into Via sent-by
    pub sent_by: BytesStr,

    local_cseq: Counter,
    pub remote_cseq: Option<u32>,

    pub auth_retries: u8,

    state: DialogState,
    state_tx: watch::Sender<DialogState>,

    /// Transactions created within the dialog, in creation order
    pub transactions: Vec<TsxKey>,

    invite_key: Option<TsxKey>,
    invite_cseq: Option<u32>,
}

impl Dialog {
    pub const AUTH_RETRY_MAX: u8 = 2;

    pub fn new(
        local_addr: NameAddr,
        remote_addr: NameAddr,
        target: SipUri,
        contact: Contact,
        transport: TransportKind,
        sent_by: BytesStr,
    ) -> Self {
        let (state_tx, _) = watch::channel(DialogState::PreDialog);

        Self {
            call_id: CallId::new(generate_call_id()),
            local_tag: generate_tag(),
            remote_tag: None,
            local_addr,
            remote_addr,
            target,
            contact,
            route_set: Vec::new(),
            transport,
            sent_by,
            local_cseq: Counter::random(),
            remote_cseq: None,
            auth_retries: 0,
            state: DialogState::PreDialog,
            state_tx,
            transactions: Vec::new(),
            invite_key: None,
            invite_cseq: None,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    /// Watch dialog state changes, used by hang-up to await Terminated
    pub fn subscribe_state(&self) -> watch::Receiver<DialogState> {
        self.state_tx.subscribe()
    }

    /// Move to `state` and wake all waiters. Terminated is sticky.
    pub fn set_state(&mut self, state: DialogState) {
        if self.state == DialogState::Terminated || state == self.state {
            return;
        }

        log::debug!("dialog {} now {state:?}", self.call_id.0);

        self.state = state;
        self.state_tx.send_replace(state);
    }

    pub fn invite_key(&self) -> Option<&TsxKey> {
        self.invite_key.as_ref()
    }

    /// The CSeq number of the most recently built request
    pub fn cseq_current(&self) -> u32 {
        self.local_cseq.current()
    }

    /// Base set of headers every request of this dialog carries
    fn base_request(
        &self,
        method: Method,
        branch: BytesStr,
        cseq: u32,
        with_remote_tag: bool,
    ) -> Request {
        let mut request = Request::new(method.clone(), self.target.clone());

        request.headers.insert_named(&Via::new(
            self.transport.sip_name(),
            self.sent_by.clone(),
            branch,
        ));
        request.headers.insert_named(&MaxForwards(70));
        request.headers.insert(
            Name::FROM,
            FromTo::new(self.local_addr.clone(), Some(self.local_tag.clone())).to_string(),
        );

        let to_tag = if with_remote_tag {
            self.remote_tag.clone()
        } else {
            None
        };
        request
            .headers
            .insert(Name::TO, FromTo::new(self.remote_addr.clone(), to_tag).to_string());

        request.headers.insert_named(&self.call_id);
        request.headers.insert_named(&CSeq::new(cseq, method));

        request
    }

    /// Build an INVITE on a fresh branch with the next CSeq.
    ///
    /// Also used for the re-INVITE after an authorization challenge, where
    /// the caller attaches the Authorization header afterwards.
    pub fn create_invite(&mut self, sdp_offer: Bytes) -> (Request, TsxKey) {
        let branch = generate_branch();
        let cseq = self.local_cseq.next();

        let mut request = self.base_request(Method::INVITE, branch.clone(), cseq, false);

        request.headers.insert_named(&self.contact);
        request.headers.insert_named(&CONTENT_TYPE_SDP);
        request.body = sdp_offer;

        let key = TsxKey::new(branch, Method::INVITE);

        self.transactions.push(key.clone());
        self.invite_key = Some(key.clone());
        self.invite_cseq = Some(cseq);

        (request, key)
    }

    /// ACK for a 2xx: its own transaction on a fresh branch, same CSeq
    /// number as the INVITE, routed over the proxy
    pub fn create_ack(&mut self) -> (Request, TsxKey) {
        let branch = generate_branch();
        let cseq = self.invite_cseq.unwrap_or(self.local_cseq.current());

        let mut request = self.base_request(Method::ACK, branch.clone(), cseq, true);

        for route in &self.route_set {
            request
                .headers
                .insert(Name::ROUTE, format!("<{route}>"));
        }

        let key = TsxKey::new(branch, Method::ACK);
        self.transactions.push(key.clone());

        (request, key)
    }

    /// ACK for a non-2xx final response, reusing the INVITE's branch
    pub fn create_ack_for_failure(&self) -> Request {
        let branch = self
            .invite_key
            .as_ref()
            .map(|key| key.branch.clone())
            .unwrap_or_else(generate_branch);
        let cseq = self.invite_cseq.unwrap_or(self.local_cseq.current());

        self.base_request(Method::ACK, branch, cseq, true)
    }

    /// CANCEL the pending INVITE: same branch, same CSeq number, To
    /// without a tag
    pub fn create_cancel(&mut self) -> (Request, TsxKey) {
        let branch = self
            .invite_key
            .as_ref()
            .map(|key| key.branch.clone())
            .unwrap_or_else(generate_branch);
        let cseq = self.invite_cseq.unwrap_or(self.local_cseq.current());

        let request = self.base_request(Method::CANCEL, branch.clone(), cseq, false);

        let key = TsxKey::new(branch, Method::CANCEL);
        self.transactions.push(key.clone());

        (request, key)
    }

    /// BYE on a fresh branch with the next CSeq
    pub fn create_bye(&mut self) -> (Request, TsxKey) {
        let branch = generate_branch();
        let cseq = self.local_cseq.next();

        let mut request = self.base_request(Method::BYE, branch.clone(), cseq, true);

        request.headers.insert(
            Name::REASON,
            "Q.850;cause=16;text=\"normal call clearing\"",
        );

        let key = TsxKey::new(branch, Method::BYE);
        self.transactions.push(key.clone());

        (request, key)
    }

    /// Response to an in-dialog request (peer BYE, OPTIONS), mirroring the
    /// request's Via chain and identity headers
    pub fn create_response(&self, request: &SipMessage, code: StatusCode) -> Response {
        let mut response = Response::new(code);

        for via in request.headers.get_all(&Name::VIA) {
            response.headers.insert(Name::VIA, via.clone());
        }

        for name in [Name::FROM, Name::TO, Name::CALL_ID, Name::CSEQ] {
            if let Some(value) = request.headers.get(&name) {
                response.headers.insert(name, value.clone());
            }
        }

        response.headers.insert_named(&self.contact);
        response
            .headers
            .insert(Name::ALLOW, "INVITE, ACK, CANCEL, BYE, OPTIONS");

        response
    }
}

/// Wait until the dialog reaches `state` (or any later one), with a timeout.
///
/// Returns false when the timeout elapsed first.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<DialogState>,
    state: DialogState,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, rx.wait_for(|current| *current >= state))
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false)
}
