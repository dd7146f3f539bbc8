use super::money::Money;
use crate::error::{RegistryError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type StudentId = i64;

/// Highest grade point a completed course can be awarded.
pub const MAX_GRADE_POINTS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Degree {
    Undergraduate,
    Graduate,
    Postgraduate,
}

impl Degree {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undergraduate => "undergraduate",
            Self::Graduate => "graduate",
            Self::Postgraduate => "postgraduate",
        }
    }
}

impl FromStr for Degree {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undergraduate" => Ok(Self::Undergraduate),
            "graduate" => Ok(Self::Graduate),
            "postgraduate" => Ok(Self::Postgraduate),
            other => Err(RegistryError::ValidationError(format!(
                "Unknown degree: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated registration, ready to be inserted by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub degree: Option<Degree>,
    pub scholarship: bool,
    pub registered_at: DateTime<Utc>,
    pub subscription_expires_at: DateTime<Utc>,
    pub next_payment_due: DateTime<Utc>,
    pub registration_fee_paid: Money,
}

/// A registered student and the running totals of everything they paid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub degree: Option<Degree>,
    pub scholarship: bool,
    pub registered_at: DateTime<Utc>,
    pub subscription_expires_at: DateTime<Utc>,
    pub next_payment_due: DateTime<Utc>,
    pub registration_fee_paid: Money,
    pub tuition_paid: Money,
    pub credits_earned: u32,
    /// Sum of grade points weighted by course credits.
    pub quality_points: Decimal,
}

impl Student {
    pub fn from_new(id: StudentId, new: NewStudent) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            degree: new.degree,
            scholarship: new.scholarship,
            registered_at: new.registered_at,
            subscription_expires_at: new.subscription_expires_at,
            next_payment_due: new.next_payment_due,
            registration_fee_paid: new.registration_fee_paid,
            tuition_paid: Money::ZERO,
            credits_earned: 0,
            quality_points: Decimal::ZERO,
        }
    }

    /// The account the gateway charges: the phone when known, else the email.
    pub fn payment_channel(&self) -> &str {
        self.phone.as_deref().unwrap_or(&self.email)
    }

    /// Adds a tuition payment (enrollment or installment) to the running total.
    pub fn record_tuition(&mut self, amount: Money) {
        self.tuition_paid += amount;
    }

    /// Applies a paid installment and returns the new subscription expiry.
    ///
    /// The window is extended from the previous expiry, never from `now`, so
    /// the expiry only moves forward regardless of when the payment lands.
    pub fn apply_installment(
        &mut self,
        amount: Money,
        extension: Duration,
        next_payment_due: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.record_tuition(amount);
        self.subscription_expires_at += extension;
        self.next_payment_due = next_payment_due;
        self.subscription_expires_at
    }

    /// Credits a completed course.
    pub fn apply_completion(&mut self, credits: u32, grade_points: Decimal) {
        self.credits_earned += credits;
        self.quality_points += grade_points * Decimal::from(credits);
    }

    /// Credit-weighted grade point average, `None` before any completed course.
    pub fn gpa(&self) -> Option<Decimal> {
        if self.credits_earned == 0 {
            return None;
        }
        Some((self.quality_points / Decimal::from(self.credits_earned)).round_dp(2))
    }
}

/// Trims and lowercases an email, rejecting obviously malformed ones.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(RegistryError::ValidationError(format!(
            "Invalid email address: {}",
            raw.trim()
        )))
    }
}

/// Accepts an optional leading `+` followed by 7 to 15 digits; spaces and
/// dashes are stripped.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(compact)
    } else {
        Err(RegistryError::ValidationError(format!(
            "Invalid phone number: {}",
            raw.trim()
        )))
    }
}

/// Grades are in `[0, 4]` with at most two decimals.
pub fn validate_grade(grade_points: Decimal) -> Result<Decimal> {
    if (grade_points.is_sign_negative() && !grade_points.is_zero())
        || grade_points > MAX_GRADE_POINTS
        || grade_points.normalize().scale() > 2
    {
        return Err(RegistryError::ValidationError(format!(
            "Grade points must be between 0 and {} with at most two decimals",
            MAX_GRADE_POINTS
        )));
    }
    Ok(grade_points.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn student() -> Student {
        let registered = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let expiry = registered + Duration::days(180);
        Student::from_new(
            1,
            NewStudent {
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                password_hash: None,
                phone: None,
                degree: Some(Degree::Undergraduate),
                scholarship: false,
                registered_at: registered,
                subscription_expires_at: expiry,
                next_payment_due: expiry,
                registration_fee_paid: Money::ZERO,
            },
        )
    }

    #[test]
    fn test_installment_extends_from_previous_expiry() {
        let mut student = student();
        let before = student.subscription_expires_at;
        let due = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();

        let expiry = student.apply_installment(
            Money::new(dec!(25)).unwrap(),
            Duration::days(30),
            due,
        );

        assert_eq!(expiry, before + Duration::days(30));
        assert_eq!(student.next_payment_due, due);
        assert_eq!(student.tuition_paid, Money::new(dec!(25)).unwrap());
    }

    #[test]
    fn test_installments_accumulate() {
        let mut student = student();
        let start = student.subscription_expires_at;
        for _ in 0..3 {
            student.apply_installment(
                Money::new(dec!(10)).unwrap(),
                Duration::days(30),
                start,
            );
        }
        assert_eq!(student.subscription_expires_at, start + Duration::days(90));
        assert_eq!(student.tuition_paid, Money::new(dec!(30)).unwrap());
    }

    #[test]
    fn test_gpa_is_credit_weighted() {
        let mut student = student();
        assert_eq!(student.gpa(), None);

        student.apply_completion(3, dec!(4.0));
        student.apply_completion(1, dec!(2.0));

        assert_eq!(student.credits_earned, 4);
        assert_eq!(student.gpa(), Some(dec!(3.5)));
    }

    #[test]
    fn test_payment_channel_prefers_phone() {
        let mut student = student();
        assert_eq!(student.payment_channel(), "a@x.com");
        student.phone = Some("+231770000000".to_string());
        assert_eq!(student.payment_channel(), "+231770000000");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@X.com ").unwrap(), "alice@x.com");
        for bad in ["", "alice", "@x.com", "alice@", "alice@x", "a b@x.com", "a@@x.com"] {
            assert!(
                matches!(normalize_email(bad), Err(RegistryError::ValidationError(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+231 77-000-0000").unwrap(), "+231770000000");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("+23177abc0000").is_err());
    }

    #[test]
    fn test_validate_grade() {
        assert_eq!(validate_grade(dec!(3.50)).unwrap(), dec!(3.5));
        assert!(validate_grade(dec!(0)).is_ok());
        assert!(validate_grade(dec!(4.01)).is_err());
        assert!(validate_grade(dec!(-1)).is_err());
        assert!(validate_grade(dec!(3.333)).is_err());
    }

    #[test]
    fn test_degree_parsing() {
        assert_eq!("Graduate".parse::<Degree>().unwrap(), Degree::Graduate);
        assert!("phd".parse::<Degree>().is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let mut student = student();
        student.password_hash = Some("$2b$04$secret".to_string());
        let json = serde_json::to_string(&student).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
