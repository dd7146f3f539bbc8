//! Plain-text certificates and transcripts.
//!
//! Both generators are pure: the same inputs always render the same bytes.
//! The caller supplies the issue date.

use crate::domain::document::Document;
use crate::domain::enrollment::Enrollment;
use crate::domain::student::Student;
use chrono::NaiveDate;

const INSTITUTION: &str = "Akin Online University";
const DATE_FORMAT: &str = "%B %-d, %Y";

/// One transcript row: the enrollment and the title of its course.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub title: String,
    pub enrollment: Enrollment,
}

/// Turns free text into a lowercase, dash-separated file name fragment.
fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn generate_certificate(student_name: &str, course_title: &str, issued_on: NaiveDate) -> Document {
    let body = format!(
        "{INSTITUTION}\n\
         \n\
         CERTIFICATE OF ENROLLMENT\n\
         \n\
         This certifies that\n\
         \n\
         {student_name}\n\
         \n\
         is enrolled in\n\
         \n\
         {course_title}\n\
         \n\
         Issued on {}\n",
        issued_on.format(DATE_FORMAT)
    );
    Document::text(
        format!(
            "certificate-{}-{}.txt",
            slug(student_name),
            slug(course_title)
        ),
        body,
    )
}

pub fn generate_transcript(student: &Student, lines: &[TranscriptLine]) -> Document {
    let gpa = student
        .gpa()
        .map(|gpa| format!("{:.2}", gpa))
        .unwrap_or_else(|| "N/A".to_string());

    let mut body = format!(
        "{INSTITUTION}\n\
         OFFICIAL TRANSCRIPT\n\
         \n\
         Name: {}\n\
         Email: {}\n\
         Registered: {}\n\
         Credits earned: {}\n\
         GPA: {}\n\
         \n\
         Courses:\n",
        student.name,
        student.email,
        student.registered_at.date_naive().format(DATE_FORMAT),
        student.credits_earned,
        gpa,
    );

    if lines.is_empty() {
        body.push_str("  (none)\n");
    }
    for line in lines {
        let enrollment = &line.enrollment;
        let (status, grade) = match (enrollment.completed, enrollment.grade_points) {
            (true, Some(points)) => ("completed", format!("{:.2}", points)),
            (true, None) => ("completed", "-".to_string()),
            (false, _) => ("in progress", "-".to_string()),
        };
        body.push_str(&format!(
            "  {} | enrolled {} | {} | grade {}\n",
            line.title,
            enrollment.enrolled_at.date_naive(),
            status,
            grade
        ));
    }

    Document::text(format!("transcript-{}.txt", slug(&student.name)), body)
}
