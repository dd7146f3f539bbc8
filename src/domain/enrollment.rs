use super::course::CourseId;
use super::money::Money;
use super::student::StudentId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type EnrollmentId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub paid: Money,
}

/// Links one student to one course; unique per (student, course).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub paid: Money,
    pub completed: bool,
    pub grade_points: Option<Decimal>,
}

impl Enrollment {
    pub fn from_new(id: EnrollmentId, new: NewEnrollment) -> Self {
        Self {
            id,
            student_id: new.student_id,
            course_id: new.course_id,
            enrolled_at: new.enrolled_at,
            ends_at: new.ends_at,
            paid: new.paid,
            completed: false,
            grade_points: None,
        }
    }
}

/// A graded course completion, applied to both the enrollment and the student.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub credits: u32,
    pub grade_points: Decimal,
}
