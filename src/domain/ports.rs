use super::course::{Course, CourseId, NewCourse};
use super::enrollment::{Completion, Enrollment, NewEnrollment};
use super::money::Amount;
use super::payment::{ChargeOutcome, Installment, Payment, PaymentDraft};
use super::student::{NewStudent, Student, StudentId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence for the registry tables.
///
/// Every mutating method is all-or-nothing: either every row it touches is
/// written, or none is. Uniqueness (student email, enrollment per student and
/// course) is enforced here, inside the write, not by callers.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Inserts a student together with an optional registration-fee payment.
    ///
    /// Fails with `DuplicateEmail` when the email is already taken.
    async fn insert_student(&self, student: NewStudent, fee: Option<PaymentDraft>)
    -> Result<Student>;
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>>;
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>>;

    async fn insert_course(&self, course: NewCourse) -> Result<Course>;
    /// Inserts every course or, on failure, none of them.
    async fn insert_courses(&self, courses: Vec<NewCourse>) -> Result<Vec<Course>>;
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>>;
    async fn list_courses(&self) -> Result<Vec<Course>>;

    async fn find_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>>;
    async fn enrollments_for(&self, student_id: StudentId) -> Result<Vec<Enrollment>>;

    /// Inserts the enrollment and its payment and adds the amount to the
    /// student's tuition total. Fails with `AlreadyEnrolled` on a duplicate.
    async fn record_enrollment(
        &self,
        enrollment: NewEnrollment,
        payment: PaymentDraft,
    ) -> Result<(Enrollment, Payment)>;

    /// Appends the payment, adds it to the tuition total and extends the
    /// subscription expiry from its stored value.
    async fn record_installment(&self, installment: Installment) -> Result<Student>;

    /// Marks the enrollment completed and credits the student.
    async fn record_completion(&self, completion: Completion) -> Result<Student>;

    async fn payments_for(&self, student_id: StudentId) -> Result<Vec<Payment>>;
}

/// The mobile-money provider, an opaque remote collaborator.
///
/// `Err` means the call itself failed (transport, malformed answer); a
/// declined charge is an `Ok` outcome with a failed status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, account: &str, amount: Amount) -> Result<ChargeOutcome>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type RegistryStoreBox = Box<dyn RegistryStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type ClockRef = Arc<dyn Clock>;
