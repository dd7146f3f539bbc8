use crate::domain::course::{Course, CourseId, NewCourse};
use crate::domain::enrollment::{Completion, Enrollment, NewEnrollment};
use crate::domain::payment::{Installment, Payment, PaymentDraft};
use crate::domain::ports::RegistryStore;
use crate::domain::student::{NewStudent, Student, StudentId};
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    students: BTreeMap<StudentId, Student>,
    /// Unique index on the normalized email.
    emails: HashMap<String, StudentId>,
    courses: BTreeMap<CourseId, Course>,
    /// Unique index on (student, course).
    enrollments: BTreeMap<(StudentId, CourseId), Enrollment>,
    payments: Vec<Payment>,
    next_student_id: i64,
    next_course_id: i64,
    next_enrollment_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn append_payment(&mut self, student_id: StudentId, draft: PaymentDraft) -> Payment {
        let id = self.payments.len() as i64 + 1;
        let payment = Payment::from_draft(id, student_id, draft);
        self.payments.push(payment.clone());
        payment
    }

    fn student_mut(&mut self, id: StudentId) -> Result<&mut Student> {
        self.students
            .get_mut(&id)
            .ok_or_else(|| RegistryError::StudentNotFound(id.to_string()))
    }
}

/// A thread-safe in-memory registry.
///
/// All tables sit behind one `RwLock`, so a mutation that touches several of
/// them is applied under a single write guard and is never observed half-done.
/// Ideal for tests and local runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryRegistryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRegistryStore {
    /// Creates a new, empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn insert_student(
        &self,
        student: NewStudent,
        fee: Option<PaymentDraft>,
    ) -> Result<Student> {
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&student.email) {
            return Err(RegistryError::DuplicateEmail(student.email));
        }

        let id = Tables::next_id(&mut tables.next_student_id);
        let student = Student::from_new(id, student);
        tables.emails.insert(student.email.clone(), id);
        tables.students.insert(id, student.clone());
        if let Some(fee) = fee {
            tables.append_payment(id, fee);
        }
        Ok(student)
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let tables = self.tables.read().await;
        Ok(tables.students.get(&id).cloned())
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.students.get(id))
            .cloned())
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course> {
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_course_id);
        let course = Course::from_new(id, course);
        tables.courses.insert(id, course.clone());
        Ok(course)
    }

    async fn insert_courses(&self, courses: Vec<NewCourse>) -> Result<Vec<Course>> {
        let mut tables = self.tables.write().await;
        let mut inserted = Vec::with_capacity(courses.len());
        for course in courses {
            let id = Tables::next_id(&mut tables.next_course_id);
            let course = Course::from_new(id, course);
            tables.courses.insert(id, course.clone());
            inserted.push(course);
        }
        Ok(inserted)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>> {
        let tables = self.tables.read().await;
        Ok(tables.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables.courses.values().cloned().collect())
    }

    async fn find_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        let tables = self.tables.read().await;
        Ok(tables.enrollments.get(&(student_id, course_id)).cloned())
    }

    async fn enrollments_for(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        let tables = self.tables.read().await;
        let mut enrollments: Vec<Enrollment> = tables
            .enrollments
            .range((student_id, CourseId::MIN)..=(student_id, CourseId::MAX))
            .map(|(_, enrollment)| enrollment.clone())
            .collect();
        enrollments.sort_by_key(|e| e.id);
        Ok(enrollments)
    }

    async fn record_enrollment(
        &self,
        enrollment: NewEnrollment,
        payment: PaymentDraft,
    ) -> Result<(Enrollment, Payment)> {
        let mut tables = self.tables.write().await;
        let key = (enrollment.student_id, enrollment.course_id);
        // Same precedence as the SQL store: student, then duplicate, then course.
        if !tables.students.contains_key(&key.0) {
            return Err(RegistryError::StudentNotFound(key.0.to_string()));
        }
        if tables.enrollments.contains_key(&key) {
            return Err(RegistryError::AlreadyEnrolled {
                student: key.0,
                course: key.1,
            });
        }
        if !tables.courses.contains_key(&key.1) {
            return Err(RegistryError::CourseNotFound(key.1));
        }
        tables.student_mut(key.0)?.record_tuition(payment.amount);

        let id = Tables::next_id(&mut tables.next_enrollment_id);
        let enrollment = Enrollment::from_new(id, enrollment);
        tables.enrollments.insert(key, enrollment.clone());
        let payment = tables.append_payment(key.0, payment);
        Ok((enrollment, payment))
    }

    async fn record_installment(&self, installment: Installment) -> Result<Student> {
        let mut tables = self.tables.write().await;
        let student = tables.student_mut(installment.student_id)?;
        student.apply_installment(
            installment.payment.amount,
            installment.extension,
            installment.next_payment_due,
        );
        let student = student.clone();
        tables.append_payment(installment.student_id, installment.payment);
        Ok(student)
    }

    async fn record_completion(&self, completion: Completion) -> Result<Student> {
        let mut tables = self.tables.write().await;
        let key = (completion.student_id, completion.course_id);
        let enrollment = tables
            .enrollments
            .get_mut(&key)
            .ok_or(RegistryError::NotEnrolled {
                student: key.0,
                course: key.1,
            })?;
        if enrollment.completed {
            return Err(RegistryError::ValidationError(format!(
                "Course {} is already completed by student {}",
                key.1, key.0
            )));
        }
        enrollment.completed = true;
        enrollment.grade_points = Some(completion.grade_points);

        let student = tables.student_mut(key.0)?;
        student.apply_completion(completion.credits, completion.grade_points);
        Ok(student.clone())
    }

    async fn payments_for(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }
}
