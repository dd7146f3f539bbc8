use crate::domain::course::{Course, CourseId, NewCourse};
use crate::domain::enrollment::{Completion, Enrollment, NewEnrollment};
use crate::domain::money::Money;
use crate::domain::payment::{Installment, Payment, PaymentDraft, PaymentMethod, PaymentPurpose};
use crate::domain::ports::RegistryStore;
use crate::domain::student::{Degree, NewStudent, Student, StudentId};
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::debug;

/// Grade points and quality points are persisted in hundredths.
const POINT_SCALE: u32 = 2;

const SCHEMA: [&str; 5] = [
    r"
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT,
        phone TEXT,
        degree TEXT,
        scholarship INTEGER NOT NULL DEFAULT 0,
        registered_on INTEGER NOT NULL,
        subscription_end INTEGER NOT NULL,
        next_payment_due INTEGER NOT NULL,
        registration_fee_paid INTEGER NOT NULL DEFAULT 0,
        tuition_paid INTEGER NOT NULL DEFAULT 0,
        credits_earned INTEGER NOT NULL DEFAULT 0,
        quality_points INTEGER NOT NULL DEFAULT 0
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        level TEXT,
        price INTEGER NOT NULL,
        duration_months INTEGER NOT NULL,
        credits INTEGER NOT NULL DEFAULT 0
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS enrollments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL REFERENCES students(id),
        course_id INTEGER NOT NULL REFERENCES courses(id),
        start_date INTEGER NOT NULL,
        end_date INTEGER NOT NULL,
        paid INTEGER NOT NULL DEFAULT 0,
        completed INTEGER NOT NULL DEFAULT 0,
        grade_points INTEGER,
        UNIQUE (student_id, course_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL REFERENCES students(id),
        amount INTEGER NOT NULL,
        payment_method TEXT NOT NULL,
        purpose TEXT NOT NULL,
        reference TEXT NOT NULL,
        payment_date INTEGER NOT NULL,
        verified INTEGER NOT NULL DEFAULT 0
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)
    ",
];

const STUDENT_COLUMNS: &str = "id, full_name, email, password_hash, phone, degree, scholarship, \
     registered_on, subscription_end, next_payment_due, registration_fee_paid, tuition_paid, \
     credits_earned, quality_points";

const COURSE_COLUMNS: &str = "id, title, description, level, price, duration_months, credits";

const ENROLLMENT_COLUMNS: &str =
    "id, student_id, course_id, start_date, end_date, paid, completed, grade_points";

const PAYMENT_COLUMNS: &str =
    "id, student_id, amount, payment_method, purpose, reference, payment_date, verified";

/// A persistent registry backed by SQLite through `sqlx`.
///
/// Money is stored in integer cents and timestamps in unix seconds, so running
/// totals and the subscription extension are plain SQL additions inside the
/// same transaction as the row they belong to.
#[derive(Clone)]
pub struct SqliteRegistryStore {
    pool: SqlitePool,
}

impl SqliteRegistryStore {
    /// Opens or creates the database at `url` (e.g. `sqlite://university.db`)
    /// and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("registry schema ready");
        Ok(())
    }

    async fn insert_payment(
        conn: &mut SqliteConnection,
        student_id: StudentId,
        draft: PaymentDraft,
    ) -> Result<Payment> {
        let result = sqlx::query(
            r"
            INSERT INTO payments (student_id, amount, payment_method, purpose, reference, payment_date, verified)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ",
        )
        .bind(student_id)
        .bind(draft.amount.to_minor_units()?)
        .bind(draft.method.as_str())
        .bind(draft.purpose.as_str())
        .bind(&draft.reference)
        .bind(draft.paid_at.timestamp())
        .execute(&mut *conn)
        .await?;

        Ok(Payment::from_draft(
            result.last_insert_rowid(),
            student_id,
            draft,
        ))
    }

    async fn insert_course_row(conn: &mut SqliteConnection, course: &NewCourse) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO courses (title, description, level, price, duration_months, credits)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.level)
        .bind(course.price.to_minor_units()?)
        .bind(i64::from(course.duration_months))
        .bind(i64::from(course.credits))
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn fetch_student(conn: &mut SqliteConnection, id: StudentId) -> Result<Student> {
        let row = sqlx::query(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RegistryError::StudentNotFound(id.to_string()))?;
        row_to_student(&row)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| RegistryError::internal(format!("Invalid stored timestamp: {}", secs)))
}

fn points_to_hundredths(points: Decimal) -> Result<i64> {
    (points * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| RegistryError::ValidationError(format!("Points {} out of range", points)))
}

fn hundredths_to_points(value: i64) -> Decimal {
    Decimal::new(value, POINT_SCALE).normalize()
}

fn count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RegistryError::internal(format!("Invalid stored {}: {}", column, value)))
}

fn row_to_student(row: &SqliteRow) -> Result<Student> {
    let degree = row
        .try_get::<Option<String>, _>("degree")?
        .map(|d| Degree::from_str(&d))
        .transpose()?;
    Ok(Student {
        id: row.try_get("id")?,
        name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        phone: row.try_get("phone")?,
        degree,
        scholarship: row.try_get("scholarship")?,
        registered_at: timestamp(row.try_get("registered_on")?)?,
        subscription_expires_at: timestamp(row.try_get("subscription_end")?)?,
        next_payment_due: timestamp(row.try_get("next_payment_due")?)?,
        registration_fee_paid: Money::from_minor_units(row.try_get("registration_fee_paid")?)?,
        tuition_paid: Money::from_minor_units(row.try_get("tuition_paid")?)?,
        credits_earned: count(row.try_get("credits_earned")?, "credits_earned")?,
        quality_points: hundredths_to_points(row.try_get("quality_points")?),
    })
}

fn row_to_course(row: &SqliteRow) -> Result<Course> {
    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        level: row.try_get("level")?,
        price: Money::from_minor_units(row.try_get("price")?)?,
        duration_months: count(row.try_get("duration_months")?, "duration_months")?,
        credits: count(row.try_get("credits")?, "credits")?,
    })
}

fn row_to_enrollment(row: &SqliteRow) -> Result<Enrollment> {
    Ok(Enrollment {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        course_id: row.try_get("course_id")?,
        enrolled_at: timestamp(row.try_get("start_date")?)?,
        ends_at: timestamp(row.try_get("end_date")?)?,
        paid: Money::from_minor_units(row.try_get("paid")?)?,
        completed: row.try_get("completed")?,
        grade_points: row
            .try_get::<Option<i64>, _>("grade_points")?
            .map(hundredths_to_points),
    })
}

fn row_to_payment(row: &SqliteRow) -> Result<Payment> {
    let method: String = row.try_get("payment_method")?;
    let purpose: String = row.try_get("purpose")?;
    Ok(Payment {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        amount: Money::from_minor_units(row.try_get("amount")?)?,
        method: PaymentMethod::parse(&method)
            .ok_or_else(|| RegistryError::internal(format!("Unknown payment method: {}", method)))?,
        purpose: PaymentPurpose::parse(&purpose).ok_or_else(|| {
            RegistryError::internal(format!("Unknown payment purpose: {}", purpose))
        })?,
        reference: row.try_get("reference")?,
        verified: row.try_get("verified")?,
        paid_at: timestamp(row.try_get("payment_date")?)?,
    })
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn insert_student(
        &self,
        student: NewStudent,
        fee: Option<PaymentDraft>,
    ) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO students (
                full_name, email, password_hash, phone, degree, scholarship,
                registered_on, subscription_end, next_payment_due, registration_fee_paid
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.password_hash)
        .bind(&student.phone)
        .bind(student.degree.map(|d| d.as_str()))
        .bind(student.scholarship)
        .bind(student.registered_at.timestamp())
        .bind(student.subscription_expires_at.timestamp())
        .bind(student.next_payment_due.timestamp())
        .bind(student.registration_fee_paid.to_minor_units()?)
        .execute(&mut *tx)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(RegistryError::DuplicateEmail(student.email));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(fee) = fee {
            Self::insert_payment(&mut tx, id, fee).await?;
        }
        tx.commit().await?;

        Ok(Student::from_new(id, student))
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let row = sqlx::query(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_student(&r)).transpose()
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_student(&r)).transpose()
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course> {
        let mut conn = self.pool.acquire().await?;
        let id = Self::insert_course_row(&mut conn, &course).await?;
        Ok(Course::from_new(id, course))
    }

    async fn insert_courses(&self, courses: Vec<NewCourse>) -> Result<Vec<Course>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(courses.len());
        for course in courses {
            let id = Self::insert_course_row(&mut tx, &course).await?;
            inserted.push(Course::from_new(id, course));
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_course(&r)).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_course).collect()
    }

    async fn find_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE student_id = ? AND course_id = ?"
        ))
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_enrollment(&r)).transpose()
    }

    async fn enrollments_for(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE student_id = ? ORDER BY id"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_enrollment).collect()
    }

    async fn record_enrollment(
        &self,
        enrollment: NewEnrollment,
        payment: PaymentDraft,
    ) -> Result<(Enrollment, Payment)> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE students SET tuition_paid = tuition_paid + ? WHERE id = ?")
            .bind(payment.amount.to_minor_units()?)
            .bind(enrollment.student_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(RegistryError::StudentNotFound(
                enrollment.student_id.to_string(),
            ));
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO enrollments (student_id, course_id, start_date, end_date, paid)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(enrollment.student_id)
        .bind(enrollment.course_id)
        .bind(enrollment.enrolled_at.timestamp())
        .bind(enrollment.ends_at.timestamp())
        .bind(enrollment.paid.to_minor_units()?)
        .execute(&mut *tx)
        .await;

        // Dropping `tx` on any error below rolls back the tuition update.
        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(RegistryError::AlreadyEnrolled {
                    student: enrollment.student_id,
                    course: enrollment.course_id,
                });
            }
            // The student row exists, so only the course reference can dangle.
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(RegistryError::CourseNotFound(enrollment.course_id));
            }
            Err(e) => return Err(e.into()),
        };

        let payment = Self::insert_payment(&mut tx, enrollment.student_id, payment).await?;
        tx.commit().await?;

        Ok((Enrollment::from_new(id, enrollment), payment))
    }

    async fn record_installment(&self, installment: Installment) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE students
            SET tuition_paid = tuition_paid + ?,
                subscription_end = subscription_end + ?,
                next_payment_due = ?
            WHERE id = ?
            ",
        )
        .bind(installment.payment.amount.to_minor_units()?)
        .bind(installment.extension.num_seconds())
        .bind(installment.next_payment_due.timestamp())
        .bind(installment.student_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RegistryError::StudentNotFound(
                installment.student_id.to_string(),
            ));
        }

        Self::insert_payment(&mut tx, installment.student_id, installment.payment).await?;
        let student = Self::fetch_student(&mut tx, installment.student_id).await?;
        tx.commit().await?;
        Ok(student)
    }

    async fn record_completion(&self, completion: Completion) -> Result<Student> {
        let mut tx = self.pool.begin().await?;
        let grade = points_to_hundredths(completion.grade_points)?;

        // `completed = 0` guards against completing the same course twice.
        let updated = sqlx::query(
            r"
            UPDATE enrollments SET completed = 1, grade_points = ?
            WHERE student_id = ? AND course_id = ? AND completed = 0
            ",
        )
        .bind(grade)
        .bind(completion.student_id)
        .bind(completion.course_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM enrollments WHERE student_id = ? AND course_id = ?")
                .bind(completion.student_id)
                .bind(completion.course_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            return Err(if exists {
                RegistryError::ValidationError(format!(
                    "Course {} is already completed by student {}",
                    completion.course_id, completion.student_id
                ))
            } else {
                RegistryError::NotEnrolled {
                    student: completion.student_id,
                    course: completion.course_id,
                }
            });
        }

        sqlx::query(
            r"
            UPDATE students
            SET credits_earned = credits_earned + ?,
                quality_points = quality_points + ?
            WHERE id = ?
            ",
        )
        .bind(i64::from(completion.credits))
        .bind(grade * i64::from(completion.credits))
        .bind(completion.student_id)
        .execute(&mut *tx)
        .await?;

        let student = Self::fetch_student(&mut tx, completion.student_id).await?;
        tx.commit().await?;
        Ok(student)
    }

    async fn payments_for(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE student_id = ? ORDER BY id"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_payment).collect()
    }
}
