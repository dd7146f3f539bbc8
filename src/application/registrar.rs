use super::documents::{TranscriptLine, generate_certificate, generate_transcript};
use crate::config::RegistrationPolicy;
use crate::domain::course::{Course, CourseId, NewCourse};
use crate::domain::document::Document;
use crate::domain::enrollment::{Completion, Enrollment, NewEnrollment};
use crate::domain::money::{Amount, Money};
use crate::domain::payment::{
    Installment, Payment, PaymentDraft, PaymentMethod, PaymentPurpose,
};
use crate::domain::ports::{ClockRef, PaymentGatewayRef, RegistryStoreBox};
use crate::domain::student::{
    Degree, NewStudent, Student, StudentId, normalize_email, normalize_phone, validate_grade,
};
use crate::error::{RegistryError, Result};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

/// Input of [`Registrar::register`].
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub degree: Option<Degree>,
    pub scholarship_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrollmentReceipt {
    pub enrollment: Enrollment,
    pub payment: Payment,
}

impl EnrollmentReceipt {
    /// `"waived"` when nothing was charged, `"success"` otherwise.
    pub fn payment_status(&self) -> &'static str {
        match self.payment.method {
            PaymentMethod::Waiver => "waived",
            PaymentMethod::MobileMoney => "success",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstallmentReceipt {
    pub student_id: StudentId,
    pub subscription_expires_at: DateTime<Utc>,
    pub next_payment_due: DateTime<Utc>,
    pub tuition_paid: Money,
    pub reference: String,
}

/// The registration, enrollment and installment service.
///
/// `Registrar` owns the store, the payment gateway and the clock. Every paid
/// operation follows the same order: read and validate, charge the gateway,
/// and only after a confirmed charge hand one atomic write to the store. A
/// declined, failed or timed-out charge therefore never leaves rows behind.
pub struct Registrar {
    store: RegistryStoreBox,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
    policy: RegistrationPolicy,
}

impl Registrar {
    /// Creates a new `Registrar`.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence for students, courses, enrollments and payments.
    /// * `gateway` - The mobile-money provider.
    /// * `clock` - Source of "now" for timestamps and windows.
    /// * `policy` - Windows, fees and scholarship rules.
    pub fn new(
        store: RegistryStoreBox,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RegistrationPolicy {
        &self.policy
    }

    /// Registers a student and returns the stored record.
    ///
    /// Fails with `DuplicateEmail` when the (normalized) email is taken. The
    /// registration fee, when configured and not waived by a scholarship, is
    /// charged before the student row is written.
    pub async fn register(&self, registration: Registration) -> Result<Student> {
        let name = registration.name.trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::ValidationError(
                "Name must not be empty".to_string(),
            ));
        }
        let email = normalize_email(&registration.email)?;
        let phone = registration
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(normalize_phone)
            .transpose()?;
        let password_hash = match registration.password {
            Some(password) if !password.is_empty() => Some(self.hash_password(password).await?),
            _ => None,
        };
        let scholarship = self
            .policy
            .scholarship_matches(registration.scholarship_code.as_deref());

        let fee = if scholarship {
            Money::ZERO
        } else {
            self.policy.registration_fee
        };
        let fee_payment = if fee.is_zero() {
            None
        } else {
            // Avoid charging for a registration that is bound to be rejected.
            if self.store.find_student_by_email(&email).await?.is_some() {
                return Err(RegistryError::DuplicateEmail(email));
            }
            let account = phone.as_deref().unwrap_or(&email);
            Some(
                self.charge(account, fee, PaymentPurpose::RegistrationFee)
                    .await?,
            )
        };

        let now = self.clock.now();
        let subscription_expires_at = now + self.policy.grace_window;
        let new_student = NewStudent {
            name,
            email,
            password_hash,
            phone,
            degree: registration.degree,
            scholarship,
            registered_at: now,
            subscription_expires_at,
            next_payment_due: subscription_expires_at,
            registration_fee_paid: fee,
        };

        let reference = fee_payment.as_ref().map(|p| p.reference.clone());
        let student = match self.store.insert_student(new_student, fee_payment).await {
            Ok(student) => student,
            Err(err) => {
                if let Some(reference) = reference {
                    warn!(%reference, error = %err, "registration fee charged but registration not stored; refund required");
                }
                return Err(err);
            }
        };
        info!(
            student_id = student.id,
            scholarship = student.scholarship,
            "student registered"
        );
        Ok(student)
    }

    /// Enrolls a student in a course, charging the course price first.
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<EnrollmentReceipt> {
        let student = self.require_student(student_id).await?;
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(RegistryError::CourseNotFound(course_id))?;

        // Checked before charging so a repeated request is never billed twice.
        if self
            .store
            .find_enrollment(student_id, course_id)
            .await?
            .is_some()
        {
            return Err(RegistryError::AlreadyEnrolled {
                student: student_id,
                course: course_id,
            });
        }

        let now = self.clock.now();
        let ends_at = now
            .checked_add_months(Months::new(course.duration_months))
            .ok_or_else(|| {
                RegistryError::ValidationError(format!(
                    "Course {} duration is out of range",
                    course.id
                ))
            })?;

        let price = self.enrollment_price(&student, &course).await?;
        let payment = self
            .charge(student.payment_channel(), price, PaymentPurpose::Enrollment)
            .await?;

        let enrollment = NewEnrollment {
            student_id,
            course_id,
            enrolled_at: now,
            ends_at,
            paid: price,
        };

        let reference = payment.reference.clone();
        let (enrollment, payment) = match self.store.record_enrollment(enrollment, payment).await
        {
            Ok(recorded) => recorded,
            Err(err) => {
                if !price.is_zero() {
                    warn!(%reference, student_id, course_id, error = %err, "course charged but enrollment not stored; refund required");
                }
                return Err(err);
            }
        };
        info!(
            student_id,
            course_id,
            paid = %payment.amount,
            reference = %payment.reference,
            "enrollment recorded"
        );
        Ok(EnrollmentReceipt {
            enrollment,
            payment,
        })
    }

    /// Pays an installment and extends the subscription by one window,
    /// counted from the previous expiry.
    pub async fn pay_installment(
        &self,
        student_id: StudentId,
        amount: Decimal,
    ) -> Result<InstallmentReceipt> {
        let amount = Amount::new(amount)?;
        let student = self.require_student(student_id).await?;
        self.apply_installment(student, amount).await
    }

    /// Same as [`Registrar::pay_installment`], looking the student up by email.
    pub async fn pay_installment_by_email(
        &self,
        email: &str,
        amount: Decimal,
    ) -> Result<InstallmentReceipt> {
        let amount = Amount::new(amount)?;
        let student = self.student_by_email(email).await?;
        self.apply_installment(student, amount).await
    }

    async fn apply_installment(
        &self,
        student: Student,
        amount: Amount,
    ) -> Result<InstallmentReceipt> {
        let payment = self
            .charge(
                student.payment_channel(),
                amount.into(),
                PaymentPurpose::Installment,
            )
            .await?;
        let reference = payment.reference.clone();
        let installment = Installment {
            student_id: student.id,
            payment,
            extension: self.policy.installment_window,
            next_payment_due: self.clock.now() + self.policy.installment_window,
        };

        let updated = match self.store.record_installment(installment).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(%reference, student_id = student.id, error = %err, "installment charged but not stored; refund required");
                return Err(err);
            }
        };
        info!(
            student_id = updated.id,
            %amount,
            expires_at = %updated.subscription_expires_at,
            "installment recorded"
        );
        Ok(InstallmentReceipt {
            student_id: updated.id,
            subscription_expires_at: updated.subscription_expires_at,
            next_payment_due: updated.next_payment_due,
            tuition_paid: updated.tuition_paid,
            reference,
        })
    }

    /// Records a graded completion and credits the student.
    pub async fn complete_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        grade_points: Decimal,
    ) -> Result<Student> {
        let grade_points = validate_grade(grade_points)?;
        self.require_student(student_id).await?;
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(RegistryError::CourseNotFound(course_id))?;

        let student = self
            .store
            .record_completion(Completion {
                student_id,
                course_id,
                credits: course.credits,
                grade_points,
            })
            .await?;
        info!(student_id, course_id, %grade_points, "course completed");
        Ok(student)
    }

    pub async fn add_course(&self, course: NewCourse) -> Result<Course> {
        let course = self.store.insert_course(course.validate()?).await?;
        info!(course_id = course.id, title = %course.title, "course added");
        Ok(course)
    }

    /// Adds a batch of courses atomically: if any is invalid or the store
    /// fails, none are added.
    pub async fn add_courses(&self, courses: Vec<NewCourse>) -> Result<Vec<Course>> {
        let courses = courses
            .into_iter()
            .map(NewCourse::validate)
            .collect::<Result<Vec<_>>>()?;
        let added = self.store.insert_courses(courses).await?;
        info!(count = added.len(), "courses added");
        Ok(added)
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        self.store.list_courses().await
    }

    pub async fn student(&self, student_id: StudentId) -> Result<Student> {
        self.require_student(student_id).await
    }

    pub async fn student_by_email(&self, email: &str) -> Result<Student> {
        let email = normalize_email(email)?;
        self.store
            .find_student_by_email(&email)
            .await?
            .ok_or(RegistryError::StudentNotFound(email))
    }

    pub async fn enrollments(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        self.store.enrollments_for(student_id).await
    }

    pub async fn payments(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        self.store.payments_for(student_id).await
    }

    /// Issues a certificate for a course the student is enrolled in.
    pub async fn certificate(&self, email: &str, course_id: CourseId) -> Result<Document> {
        let student = self.student_by_email(email).await?;
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or(RegistryError::CourseNotFound(course_id))?;
        if self
            .store
            .find_enrollment(student.id, course_id)
            .await?
            .is_none()
        {
            return Err(RegistryError::NotEnrolled {
                student: student.id,
                course: course_id,
            });
        }
        Ok(generate_certificate(
            &student.name,
            &course.title,
            self.clock.now().date_naive(),
        ))
    }

    pub async fn transcript(&self, email: &str) -> Result<Document> {
        let student = self.student_by_email(email).await?;
        let mut lines = Vec::new();
        for enrollment in self.store.enrollments_for(student.id).await? {
            let title = self
                .store
                .get_course(enrollment.course_id)
                .await?
                .map(|c| c.title)
                .unwrap_or_else(|| format!("Course {}", enrollment.course_id));
            lines.push(TranscriptLine { title, enrollment });
        }
        Ok(generate_transcript(&student, &lines))
    }

    async fn require_student(&self, student_id: StudentId) -> Result<Student> {
        self.store
            .get_student(student_id)
            .await?
            .ok_or_else(|| RegistryError::StudentNotFound(student_id.to_string()))
    }

    async fn enrollment_price(&self, student: &Student, course: &Course) -> Result<Money> {
        if self.policy.free_first_course
            && student.degree == Some(Degree::Undergraduate)
            && self.store.enrollments_for(student.id).await?.is_empty()
        {
            return Ok(Money::ZERO);
        }
        if student.scholarship {
            return Ok(course
                .price
                .discounted(self.policy.scholarship_discount_percent));
        }
        Ok(course.price)
    }

    /// Charges `price` through the gateway under the configured timeout.
    ///
    /// A zero price is waived without contacting the gateway. Declines,
    /// transport errors and timeouts all map to `PaymentFailed`.
    async fn charge(
        &self,
        account: &str,
        price: Money,
        purpose: PaymentPurpose,
    ) -> Result<PaymentDraft> {
        let now = self.clock.now();
        let Ok(amount) = Amount::try_from(price) else {
            return Ok(PaymentDraft::waiver(purpose, now));
        };

        let outcome =
            match tokio::time::timeout(self.policy.gateway_timeout, self.gateway.charge(account, amount))
                .await
            {
                Err(_) => {
                    warn!(%purpose, %amount, "payment gateway timed out");
                    return Err(RegistryError::PaymentFailed(
                        "payment gateway timed out".to_string(),
                    ));
                }
                Ok(Err(RegistryError::PaymentFailed(reason))) => {
                    warn!(%purpose, %amount, %reason, "payment gateway call failed");
                    return Err(RegistryError::PaymentFailed(reason));
                }
                Ok(Err(err)) => {
                    warn!(%purpose, %amount, error = %err, "payment gateway call failed");
                    return Err(RegistryError::PaymentFailed(err.to_string()));
                }
                Ok(Ok(outcome)) => outcome,
            };

        if !outcome.is_success() {
            warn!(%purpose, %amount, reference = %outcome.reference, "payment declined");
            return Err(RegistryError::PaymentFailed(format!(
                "payment declined (reference {})",
                outcome.reference
            )));
        }

        Ok(PaymentDraft {
            amount: price,
            method: PaymentMethod::MobileMoney,
            purpose,
            reference: outcome.reference,
            paid_at: now,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let cost = self.policy.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(RegistryError::internal)?
            .map_err(RegistryError::internal)
    }
}
