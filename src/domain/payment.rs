use super::money::Money;
use super::student::StudentId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PaymentId = i64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    /// Nothing was charged; the price was waived by policy.
    Waiver,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    RegistrationFee,
    Enrollment,
    Installment,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($s => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(PaymentMethod {
    MobileMoney => "mobile_money",
    Waiver => "waiver",
});

str_enum!(PaymentPurpose {
    RegistrationFee => "registration_fee",
    Enrollment => "enrollment",
    Installment => "installment",
});

/// A verified payment that has not been attached to a student row yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub amount: Money,
    pub method: PaymentMethod,
    pub purpose: PaymentPurpose,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

impl PaymentDraft {
    /// A zero-amount row recording that a price was waived.
    pub fn waiver(purpose: PaymentPurpose, paid_at: DateTime<Utc>) -> Self {
        Self {
            amount: Money::ZERO,
            method: PaymentMethod::Waiver,
            purpose,
            reference: "waived".to_string(),
            paid_at,
        }
    }
}

/// Append-only record of a monetary transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub purpose: PaymentPurpose,
    pub reference: String,
    pub verified: bool,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    /// Only drafts confirmed by the gateway (or waived) are ever persisted,
    /// so every stored payment is verified.
    pub fn from_draft(id: PaymentId, student_id: StudentId, draft: PaymentDraft) -> Self {
        Self {
            id,
            student_id,
            amount: draft.amount,
            method: draft.method,
            purpose: draft.purpose,
            reference: draft.reference,
            verified: true,
            paid_at: draft.paid_at,
        }
    }
}

/// Everything a store needs to apply one paid installment atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct Installment {
    pub student_id: StudentId,
    pub payment: PaymentDraft,
    pub extension: Duration,
    pub next_payment_due: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Failed,
}

/// What the mobile-money provider answered for one charge.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ChargeOutcome {
    pub status: ChargeStatus,
    pub reference: String,
}

impl ChargeOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ChargeStatus::Success
    }
}
