//! `routegrid-gate`: validates outreach copy against a mode policy.
//!
//! Fixed order: presignal gate, structure, lane crossing, mode vocabulary and
//! evidence-gated claims. [`CopyValidator::can_send`] is the only authority for
//! handing a draft to a [`Sender`].

pub mod lexicon;
pub mod neutralize;
pub mod send;
pub mod validator;

pub use neutralize::{neutralize_intro, NeutralizeOutcome};
pub use send::{SendGate, SendOutcome, SendReceipt, Sender};
pub use validator::{CopyContext, CopyValidator, ValidationResult};
