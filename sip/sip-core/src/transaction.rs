//! Client transaction table with retransmission & timeout bookkeeping.
//!
//! Transactions are keyed by their top-Via branch plus the request method.
//! The table itself is passive: the dialog driver asks for
//! [`Transactions::next_wakeup`], sleeps until then and calls
//! [`Transactions::drive`] to collect due retransmissions and timeouts.

use bytes::Bytes;
use bytesstr::BytesStr;
use sip_types::{CodeKind, Method};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub mod consts {
    use std::time::Duration;

    pub const T1: Duration = Duration::from_millis(500);
    pub const T2: Duration = Duration::from_secs(4);

    /// Timer B/F, giving up on a final response (64 x T1)
    pub const TIMEOUT: Duration = Duration::from_secs(32);

    /// How long a completed transaction lingers to absorb retransmitted
    /// responses (32 x T1)
    pub const LINGER: Duration = Duration::from_secs(16);

    pub const RFC3261_BRANCH_PREFIX: &str = "z9hG4bK";
}

pub fn generate_branch() -> BytesStr {
    use rand::distr::Alphanumeric;
    use rand::{rng, Rng};

    consts::RFC3261_BRANCH_PREFIX
        .bytes()
        .chain(rng().sample_iter(Alphanumeric).take(23))
        .map(char::from)
        .collect::<String>()
        .into()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsxKey {
    pub branch: BytesStr,
    pub method: Method,
}

impl TsxKey {
    pub fn new(branch: BytesStr, method: Method) -> Self {
        Self { branch, method }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsxState {
    /// INVITE sent, no response yet
    Calling,
    /// Non-INVITE sent, no response yet
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

#[derive(Debug)]
pub struct Transaction {
    pub key: TsxKey,
    pub cseq: u32,
    pub state: TsxState,

    request: Bytes,

    retransmit_at: Option<Instant>,
    retransmit_interval: Duration,
    timeout_at: Instant,
    remove_at: Option<Instant>,
}

impl Transaction {
    /// The serialized request, for retransmission
    pub fn request(&self) -> &Bytes {
        &self.request
    }

    fn awaits_final_response(&self) -> bool {
        matches!(
            self.state,
            TsxState::Calling | TsxState::Trying | TsxState::Proceeding
        )
    }
}

/// Timer driven things the owner of the table has to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TsxEvent {
    /// Resend the transaction's request
    Retransmit(TsxKey),
    /// No final response within 64 x T1, transaction is terminated
    TimedOut(TsxKey),
}

#[derive(Debug, Default)]
pub struct Transactions {
    map: HashMap<TsxKey, Transaction>,
}

impl Transactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly sent request.
    ///
    /// `reliable` disables the retransmission schedule, timeouts still apply.
    pub fn add(
        &mut self,
        branch: BytesStr,
        method: Method,
        cseq: u32,
        request: Bytes,
        reliable: bool,
        now: Instant,
    ) -> &Transaction {
        let state = if method == Method::INVITE {
            TsxState::Calling
        } else {
            TsxState::Trying
        };

        let key = TsxKey::new(branch, method);

        let transaction = Transaction {
            key: key.clone(),
            cseq,
            state,
            request,
            retransmit_at: (!reliable).then(|| now + consts::T1),
            retransmit_interval: consts::T1,
            timeout_at: now + consts::TIMEOUT,
            remove_at: None,
        };

        self.map.entry(key).or_insert(transaction)
    }

    /// Find a transaction by branch alone, as responses are matched by the
    /// Via branch they echo
    pub fn find(&self, branch: &str) -> Option<&Transaction> {
        self.map.values().find(|tsx| tsx.key.branch == branch)
    }

    pub fn get(&self, key: &TsxKey) -> Option<&Transaction> {
        self.map.get(key)
    }

    /// Advance transaction state for a received response.
    ///
    /// Returns the new state, or `None` when no transaction matches.
    pub fn on_response(
        &mut self,
        branch: &str,
        method: &Method,
        kind: CodeKind,
        now: Instant,
    ) -> Option<TsxState> {
        let transaction = self
            .map
            .values_mut()
            .find(|tsx| tsx.key.branch == branch && &tsx.key.method == method)?;

        match kind {
            CodeKind::Provisional => {
                if transaction.awaits_final_response() {
                    transaction.state = TsxState::Proceeding;
                    transaction.retransmit_at = None;
                }
            }
            CodeKind::Success if transaction.key.method == Method::INVITE => {
                // 2xx to INVITE, the ACK forms its own transaction
                transaction.state = TsxState::Terminated;
                transaction.retransmit_at = None;
                transaction.remove_at = Some(now + consts::LINGER);
            }
            _ => {
                transaction.state = TsxState::Completed;
                transaction.retransmit_at = None;
                transaction.remove_at = Some(now + consts::LINGER);
            }
        }

        Some(transaction.state)
    }

    /// The next point in time [`Transactions::drive`] has work to do
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.map
            .values()
            .flat_map(|tsx| {
                let timeout = tsx.awaits_final_response().then_some(tsx.timeout_at);

                [tsx.retransmit_at, timeout, tsx.remove_at]
            })
            .flatten()
            .min()
    }

    /// Collect all due timer events and prune dead transactions
    pub fn drive(&mut self, now: Instant) -> Vec<TsxEvent> {
        let mut events = Vec::new();

        for transaction in self.map.values_mut() {
            if transaction.awaits_final_response() && now >= transaction.timeout_at {
                transaction.state = TsxState::Terminated;
                transaction.retransmit_at = None;
                transaction.remove_at = Some(now);

                events.push(TsxEvent::TimedOut(transaction.key.clone()));
                continue;
            }

            if let Some(retransmit_at) = transaction.retransmit_at {
                if now >= retransmit_at {
                    transaction.retransmit_interval =
                        (transaction.retransmit_interval * 2).min(consts::T2);
                    transaction.retransmit_at = Some(now + transaction.retransmit_interval);

                    events.push(TsxEvent::Retransmit(transaction.key.clone()));
                }
            }
        }

        self.map
            .retain(|_, tsx| tsx.remove_at.is_none_or(|remove_at| now < remove_at));

        events
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
