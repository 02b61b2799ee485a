//! Event ingress adapters
//!
//! Turns JSON envelopes from the payment webhook and the signup/upgrade API
//! into typed events, validates them and hands them to the engine. Every
//! outcome maps onto a status the delivery layer understands; a failed event
//! is reported as "processing failed, please retry" and nothing of it is
//! persisted.

use crate::engine::ReferralEngine;
use crate::errors::{LedgerError, Result};
use crate::events::{MemberSignedUp, MemberUpgraded, PaymentCompleted, SignupOutcome, UpgradeOutcome};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Message returned for every failed event
pub const RETRY_MESSAGE: &str = "processing failed, please retry";

/// Inbound envelope, tagged by `type`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    PaymentCompleted(PaymentCompleted),
    MemberSignedUp(MemberSignedUp),
    MemberUpgraded(MemberUpgraded),
}

impl InboundEvent {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PaymentCompleted(_) => "payment_completed",
            Self::MemberSignedUp(_) => "member_signed_up",
            Self::MemberUpgraded(_) => "member_upgraded",
        }
    }

    /// Identifier used in logs and responses
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::PaymentCompleted(event) => &event.event_id,
            Self::MemberSignedUp(event) => &event.new_member_id,
            Self::MemberUpgraded(event) => &event.member_id,
        }
    }

    /// Reject envelopes the engine cannot act on
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PaymentCompleted(event) => {
                require_id("event_id", &event.event_id)?;
                require_id("payer_id", &event.payer_id)?;
                if event.amount_paid_minor == 0 {
                    return Err(LedgerError::InvalidEvent(
                        "amount_paid_minor must be greater than 0".to_string(),
                    ));
                }
            }
            Self::MemberSignedUp(event) => {
                require_id("referrer_id", &event.referrer_id)?;
                require_id("new_member_id", &event.new_member_id)?;
                if event.referrer_id == event.new_member_id {
                    return Err(LedgerError::InvalidEvent(
                        "a member cannot refer themselves".to_string(),
                    ));
                }
            }
            Self::MemberUpgraded(event) => {
                require_id("member_id", &event.member_id)?;
            }
        }
        Ok(())
    }
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidEvent(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Parse and validate one JSON envelope
pub fn parse_event(json: &str) -> Result<InboundEvent> {
    let event: InboundEvent =
        serde_json::from_str(json).map_err(|e| LedgerError::InvalidEvent(e.to_string()))?;
    event.validate()?;
    Ok(event)
}

/// What the delivery layer should do with the event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngressStatus {
    /// Committed with new effects
    Processed,
    /// Already applied by an earlier delivery; acknowledge
    Duplicate,
    /// Recorded, credit waits for a later event
    Deferred,
    /// Malformed; redelivery will not help
    Rejected,
    /// Rolled back
    Failed { retryable: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressResponse {
    #[serde(flatten)]
    pub status: IngressStatus,
    pub message: String,
}

impl IngressResponse {
    fn new(status: IngressStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn from_error(kind: &str, subject: &str, error: &LedgerError) -> Self {
        if let LedgerError::InvalidEvent(reason) = error {
            return Self::new(IngressStatus::Rejected, reason.clone());
        }
        if error.is_data_corruption() {
            error!(kind, subject, error = %error, "Event aborted on corrupt referral data");
        } else {
            warn!(kind, subject, error = %error, "Event failed");
        }
        Self::new(
            IngressStatus::Failed {
                retryable: error.is_retryable(),
            },
            RETRY_MESSAGE,
        )
    }
}

/// Run a validated event through the engine
pub fn dispatch(engine: &mut ReferralEngine, event: &InboundEvent) -> IngressResponse {
    let result = match event {
        InboundEvent::PaymentCompleted(payment) => {
            engine.process_payment(payment).map(|report| {
                if report.is_replay() {
                    IngressResponse::new(IngressStatus::Duplicate, "payment already applied")
                } else {
                    IngressResponse::new(
                        IngressStatus::Processed,
                        format!("{} commission entries written", report.entries.len()),
                    )
                }
            })
        }
        InboundEvent::MemberSignedUp(signup) => {
            engine.process_signup(signup).map(|outcome| match outcome {
                SignupOutcome::Credited(credit) => IngressResponse::new(
                    IngressStatus::Processed,
                    format!(
                        "{} members credited, {} bonuses issued",
                        credit.credits.len(),
                        credit.bonuses.len()
                    ),
                ),
                SignupOutcome::Pending => {
                    IngressResponse::new(IngressStatus::Deferred, "signup recorded as pending")
                }
                SignupOutcome::Duplicate => {
                    IngressResponse::new(IngressStatus::Duplicate, "signup already credited")
                }
            })
        }
        InboundEvent::MemberUpgraded(upgrade) => {
            engine.process_upgrade(upgrade).map(|outcome| match outcome {
                UpgradeOutcome::Credited(credit) => IngressResponse::new(
                    IngressStatus::Processed,
                    format!(
                        "{} members credited, {} bonuses issued",
                        credit.credits.len(),
                        credit.bonuses.len()
                    ),
                ),
                UpgradeOutcome::Ignored => {
                    IngressResponse::new(IngressStatus::Processed, "upgrade recorded without credit")
                }
                UpgradeOutcome::AlreadyCredited => {
                    IngressResponse::new(IngressStatus::Duplicate, "signup already credited")
                }
                UpgradeOutcome::NoSignup => {
                    IngressResponse::new(IngressStatus::Processed, "upgrade recorded, no signup on file")
                }
            })
        }
    };

    result.unwrap_or_else(|e| IngressResponse::from_error(event.kind(), event.subject(), &e))
}

/// Parse, validate and dispatch one JSON envelope
pub fn handle_json(engine: &mut ReferralEngine, json: &str) -> IngressResponse {
    match parse_event(json) {
        Ok(event) => dispatch(engine, &event),
        Err(e) => IngressResponse::from_error("unknown", "-", &e),
    }
}
