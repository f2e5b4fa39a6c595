#![warn(unreachable_pub)]
//! Client dialog state for INVITE initiated sessions.
//!
//! A [`Dialog`] owns the identity triple (Call-ID, local tag, remote tag),
//! both CSeq directions and the request builders that keep the dialog's
//! invariants: strictly increasing local CSeq, a fresh branch per request
//! and the branch/CSeq reuse rules for ACK and CANCEL.

mod dialog;
mod util;

pub use dialog::{Dialog, DialogState, wait_for_state};
pub use util::{Counter, generate_call_id, generate_tag};
