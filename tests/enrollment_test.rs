mod common;

use akin_university::application::registrar::Registrar;
use akin_university::config::RegistrationPolicy;
use akin_university::domain::enrollment::NewEnrollment;
use akin_university::domain::money::Amount;
use akin_university::domain::payment::{
    ChargeOutcome, ChargeStatus, PaymentDraft, PaymentMethod, PaymentPurpose,
};
use akin_university::domain::ports::{PaymentGateway, PaymentGatewayRef, RegistryStore};
use akin_university::domain::student::Degree;
use akin_university::error::RegistryError;
use akin_university::infrastructure::clock::FixedClock;
use akin_university::infrastructure::gateway::StaticGateway;
use akin_university::infrastructure::in_memory::InMemoryRegistryStore;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_enroll_then_duplicate_is_rejected_without_second_charge() {
    let h = harness();
    let alice = h
        .registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    let course = add_course(&h.registrar, "Intro to Computing", dec!(200)).await;
    assert_eq!((alice.id, course.id), (1, 1));

    let receipt = h.registrar.enroll(1, 1).await.unwrap();
    assert_eq!(receipt.enrollment.student_id, 1);
    assert_eq!(receipt.enrollment.course_id, 1);
    assert_eq!(receipt.enrollment.paid, money(dec!(200)));
    assert_eq!(receipt.payment_status(), "success");
    assert!(receipt.payment.verified);
    assert!(receipt.payment.reference.starts_with("MOCK-"));

    let again = h.registrar.enroll(1, 1).await;
    assert!(matches!(
        again,
        Err(RegistryError::AlreadyEnrolled {
            student: 1,
            course: 1
        })
    ));

    assert_eq!(h.gateway.charges(), 1);
    let student = h.registrar.student(1).await.unwrap();
    assert_eq!(student.tuition_paid, money(dec!(200)));
    assert_eq!(h.registrar.enrollments(1).await.unwrap().len(), 1);
    assert_eq!(h.registrar.payments(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_enrollment_ends_after_course_duration() {
    let h = harness();
    h.registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    let course = h
        .registrar
        .add_course(new_course("Year long", dec!(50), 12, 6))
        .await
        .unwrap();

    let receipt = h.registrar.enroll(1, course.id).await.unwrap();
    assert_eq!(receipt.enrollment.enrolled_at, start_time());
    assert_eq!(
        receipt.enrollment.ends_at,
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap()
    );
    assert!(!receipt.enrollment.completed);
}

#[tokio::test]
async fn test_unknown_student_or_course() {
    let h = harness();
    add_course(&h.registrar, "Algebra", dec!(10)).await;
    assert!(matches!(
        h.registrar.enroll(42, 1).await,
        Err(RegistryError::StudentNotFound(_))
    ));

    h.registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    assert!(matches!(
        h.registrar.enroll(1, 99).await,
        Err(RegistryError::CourseNotFound(99))
    ));
    assert_eq!(h.gateway.charges(), 0);
}

#[tokio::test]
async fn test_declined_payment_changes_nothing() {
    let h = harness_with(
        Box::new(InMemoryRegistryStore::new()),
        StaticGateway::declining(),
        test_policy(),
    );
    h.registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    add_course(&h.registrar, "Algebra", dec!(200)).await;

    let result = h.registrar.enroll(1, 1).await;
    assert!(matches!(result, Err(RegistryError::PaymentFailed(_))));

    let student = h.registrar.student(1).await.unwrap();
    assert!(student.tuition_paid.is_zero());
    assert!(h.registrar.enrollments(1).await.unwrap().is_empty());
    assert!(h.registrar.payments(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_gateway_timeout_and_transport_errors_fail_closed() {
    let gateways: [PaymentGatewayRef; 2] = [Arc::new(HangingGateway), Arc::new(BrokenGateway)];
    for gateway in gateways {
        let registrar = registrar_with_gateway(gateway, test_policy());
        registrar
            .register(registration("Alice", "a@x.com"))
            .await
            .unwrap();
        add_course(&registrar, "Algebra", dec!(200)).await;

        let result = registrar.enroll(1, 1).await;
        assert!(matches!(result, Err(RegistryError::PaymentFailed(_))));
        assert!(registrar.enrollments(1).await.unwrap().is_empty());
        assert!(registrar.student(1).await.unwrap().tuition_paid.is_zero());
    }
}

#[tokio::test]
async fn test_scholarship_discount_applies_to_price() {
    let h = harness_with(
        Box::new(InMemoryRegistryStore::new()),
        StaticGateway::approving(),
        RegistrationPolicy {
            scholarship_code: Some("AKIN".to_string()),
            ..test_policy()
        },
    );
    let mut reg = registration("Alice", "a@x.com");
    reg.scholarship_code = Some("AKIN".to_string());
    h.registrar.register(reg).await.unwrap();
    add_course(&h.registrar, "Algebra", dec!(199.99)).await;

    let receipt = h.registrar.enroll(1, 1).await.unwrap();
    assert_eq!(receipt.enrollment.paid, money(dec!(100)));
    assert_eq!(receipt.payment.amount, money(dec!(100)));
}

#[tokio::test]
async fn test_free_first_course_for_undergraduates() {
    let h = harness_with(
        Box::new(InMemoryRegistryStore::new()),
        StaticGateway::approving(),
        RegistrationPolicy {
            free_first_course: true,
            ..test_policy()
        },
    );
    let mut undergrad = registration("Alice", "a@x.com");
    undergrad.degree = Some(Degree::Undergraduate);
    let mut graduate = registration("Bob", "b@x.com");
    graduate.degree = Some(Degree::Graduate);
    h.registrar.register(undergrad).await.unwrap();
    h.registrar.register(graduate).await.unwrap();
    add_course(&h.registrar, "Algebra", dec!(200)).await;
    add_course(&h.registrar, "History", dec!(150)).await;

    let first = h.registrar.enroll(1, 1).await.unwrap();
    assert_eq!(first.payment_status(), "waived");
    assert_eq!(first.payment.method, PaymentMethod::Waiver);
    assert_eq!(first.payment.purpose, PaymentPurpose::Enrollment);
    assert_eq!(h.gateway.charges(), 0);

    let second = h.registrar.enroll(1, 2).await.unwrap();
    assert_eq!(second.payment_status(), "success");
    assert_eq!(second.enrollment.paid, money(dec!(150)));

    let graduate_enrollment = h.registrar.enroll(2, 1).await.unwrap();
    assert_eq!(graduate_enrollment.enrollment.paid, money(dec!(200)));
    assert_eq!(h.gateway.charges(), 2);
}

#[tokio::test]
async fn test_completion_credits_student_and_computes_gpa() {
    let h = harness();
    h.registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    let algebra = h
        .registrar
        .add_course(new_course("Algebra", dec!(10), 6, 3))
        .await
        .unwrap();
    let history = h
        .registrar
        .add_course(new_course("History", dec!(10), 6, 1))
        .await
        .unwrap();
    h.registrar.enroll(1, algebra.id).await.unwrap();
    h.registrar.enroll(1, history.id).await.unwrap();

    // Enrolling alone grants nothing.
    assert_eq!(h.registrar.student(1).await.unwrap().credits_earned, 0);

    h.registrar
        .complete_enrollment(1, algebra.id, dec!(4.0))
        .await
        .unwrap();
    let student = h
        .registrar
        .complete_enrollment(1, history.id, dec!(2.0))
        .await
        .unwrap();
    assert_eq!(student.credits_earned, 4);
    assert_eq!(student.gpa(), Some(dec!(3.50)));

    let twice = h
        .registrar
        .complete_enrollment(1, algebra.id, dec!(1.0))
        .await;
    assert!(matches!(twice, Err(RegistryError::ValidationError(_))));
    assert_eq!(h.registrar.student(1).await.unwrap().credits_earned, 4);
}

#[tokio::test]
async fn test_completion_requires_enrollment_and_valid_grade() {
    let h = harness();
    h.registrar
        .register(registration("Alice", "a@x.com"))
        .await
        .unwrap();
    add_course(&h.registrar, "Algebra", dec!(10)).await;

    assert!(matches!(
        h.registrar.complete_enrollment(1, 1, dec!(3)).await,
        Err(RegistryError::NotEnrolled { .. })
    ));

    h.registrar.enroll(1, 1).await.unwrap();
    for grade in [dec!(-0.5), dec!(4.01), dec!(3.333)] {
        assert!(matches!(
            h.registrar.complete_enrollment(1, 1, grade).await,
            Err(RegistryError::ValidationError(_))
        ));
    }
}

#[tokio::test]
async fn test_certificate_and_transcript() {
    let h = harness();
    h.registrar
        .register(registration("Ama Mensah", "ama@x.com"))
        .await
        .unwrap();
    add_course(&h.registrar, "Public Health", dec!(10)).await;

    assert!(matches!(
        h.registrar.certificate("ama@x.com", 1).await,
        Err(RegistryError::NotEnrolled { .. })
    ));
    assert!(matches!(
        h.registrar.certificate("nobody@x.com", 1).await,
        Err(RegistryError::StudentNotFound(_))
    ));

    h.registrar.enroll(1, 1).await.unwrap();
    let first = h.registrar.certificate("AMA@x.com", 1).await.unwrap();
    let second = h.registrar.certificate("ama@x.com", 1).await.unwrap();
    assert_eq!(first, second);
    assert!(first.body.contains("Ama Mensah"));
    assert!(first.body.contains("Public Health"));
    assert!(first.body.contains("January 15, 2025"));

    let transcript = h.registrar.transcript("ama@x.com").await.unwrap();
    assert!(transcript.body.contains("GPA: N/A"));
    assert!(transcript.body.contains("Public Health"));
    assert!(transcript.body.contains("in progress"));
}

/// Approves the charge, but records the same enrollment through the shared
/// store first, as a concurrent request would.
struct RacingGateway {
    store: InMemoryRegistryStore,
}

#[async_trait]
impl PaymentGateway for RacingGateway {
    async fn charge(
        &self,
        _account: &str,
        amount: Amount,
    ) -> akin_university::error::Result<ChargeOutcome> {
        let now = start_time();
        self.store
            .record_enrollment(
                NewEnrollment {
                    student_id: 1,
                    course_id: 1,
                    enrolled_at: now,
                    ends_at: now + chrono::Duration::days(180),
                    paid: amount.into(),
                },
                PaymentDraft {
                    amount: amount.into(),
                    method: PaymentMethod::MobileMoney,
                    purpose: PaymentPurpose::Enrollment,
                    reference: "MM-FIRST".to_string(),
                    paid_at: now,
                },
            )
            .await?;
        Ok(ChargeOutcome {
            status: ChargeStatus::Success,
            reference: "MM-SECOND".to_string(),
        })
    }
}

#[tokio::test]
async fn test_enrollment_lost_to_concurrent_request_is_not_recorded_twice() {
    let store = InMemoryRegistryStore::new();
    let registrar = Registrar::new(
        Box::new(store.clone()),
        Arc::new(RacingGateway {
            store: store.clone(),
        }),
        Arc::new(FixedClock::new(start_time())),
        test_policy(),
    );
    let student = registrar
        .register(registration("Efua", "efua@x.com"))
        .await
        .unwrap();
    let course = add_course(&registrar, "Epidemiology", dec!(200)).await;
    assert_eq!((student.id, course.id), (1, 1));

    let result = registrar.enroll(student.id, course.id).await;
    assert!(matches!(
        result,
        Err(RegistryError::AlreadyEnrolled {
            student: 1,
            course: 1
        })
    ));

    let enrollments = registrar.enrollments(student.id).await.unwrap();
    assert_eq!(enrollments.len(), 1);
    let payments = store.payments_for(student.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].reference, "MM-FIRST");
    assert_eq!(
        registrar.student(student.id).await.unwrap().tuition_paid,
        money(dec!(200))
    );
}
