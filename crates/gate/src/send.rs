use routegrid_core::IntroDraft;
use serde::{Deserialize, Serialize};

use crate::validator::{CopyContext, CopyValidator, ValidationResult};

/// Result reported by a send collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// External delivery (email campaign, CRM task, ...). Only ever called
/// through [`SendGate`].
pub trait Sender: Send + Sync {
    fn send(&self, intro: &IntroDraft, recipient: &str) -> SendReceipt;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The gate passed and the sender reported success.
    Sent(SendReceipt),
    /// The gate passed and the sender reported failure.
    Failed(SendReceipt),
    /// The gate refused; the sender was not called.
    Rejected(ValidationResult),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent(_))
    }
}

pub struct SendGate<'a> {
    validator: &'a CopyValidator<'a>,
    sender: &'a dyn Sender,
}

impl<'a> SendGate<'a> {
    pub fn new(validator: &'a CopyValidator<'a>, sender: &'a dyn Sender) -> Self {
        Self { validator, sender }
    }

    pub fn send(&self, intro: &IntroDraft, recipient: &str, ctx: &CopyContext<'_>) -> SendOutcome {
        let check = self.validator.check_send(&intro.body, ctx);
        if !check.is_clean() {
            log::warn!(
                "send refused for ({}, {}): {} error(s), {} warning(s)",
                intro.demand_entity_id,
                intro.supply_entity_id,
                check.errors.len(),
                check.warnings.len()
            );
            return SendOutcome::Rejected(check);
        }
        let receipt = self.sender.send(intro, recipient);
        if receipt.sent {
            log::info!("sent intro ({}, {}) to {recipient}", intro.demand_entity_id, intro.supply_entity_id);
            SendOutcome::Sent(receipt)
        } else {
            log::warn!(
                "sender failed for ({}, {}): {}",
                intro.demand_entity_id,
                intro.supply_entity_id,
                receipt.error.as_deref().unwrap_or("unknown error")
            );
            SendOutcome::Failed(receipt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use routegrid_config::ModePolicies;
    use routegrid_core::{EntityType, IntroSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSender(AtomicUsize);

    impl Sender for CountingSender {
        fn send(&self, _intro: &IntroDraft, _recipient: &str) -> SendReceipt {
            self.0.fetch_add(1, Ordering::SeqCst);
            SendReceipt { sent: true, error: None }
        }
    }

    fn draft(body: &str) -> IntroDraft {
        IntroDraft {
            demand_entity_id: "ent_d".into(),
            supply_entity_id: "ent_s".into(),
            subject: "Intro".into(),
            body: body.into(),
            tone: "neutral".into(),
            generated_at: Utc::now(),
            source: IntroSource::Template,
            match_rationale: String::new(),
            evidence_refs: Vec::new(),
        }
    }

    const CTX: CopyContext<'static> = CopyContext {
        mode: "recruiting",
        audience: EntityType::Demand,
        presignal: None,
        evidence: &[],
    };

    #[test]
    fn clean_copy_is_sent() {
        let v = CopyValidator::new(ModePolicies::builtin());
        let sender = CountingSender(AtomicUsize::new(0));
        let gate = SendGate::new(&v, &sender);
        let intro = draft("Hi Ada, I know a recruiter who places senior engineers. Want an intro?");
        assert!(gate.send(&intro, "ada@acme.com", &CTX).is_sent());
        assert_eq!(sender.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn warnings_block_the_send() {
        // Lenient validation would pass this (warnings only); the gate is strict.
        let v = CopyValidator::new(ModePolicies::builtin());
        let sender = CountingSender(AtomicUsize::new(0));
        let gate = SendGate::new(&v, &sender);
        let intro = draft("Quick note about a recruiter who places engineers.");
        assert!(v.validate(&intro.body, &CTX).passed());
        assert!(matches!(gate.send(&intro, "ada@acme.com", &CTX), SendOutcome::Rejected(_)));
        assert_eq!(sender.0.load(Ordering::SeqCst), 0);
    }
}
