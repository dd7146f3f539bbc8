//! Request bodies and query strings accepted by the HTTP API.
//!
//! Ids are accepted as JSON numbers or numeric strings, since the landing
//! page forms submit everything as text.

use crate::domain::course::CourseId;
use crate::domain::student::StudentId;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

fn id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid id: {:?}", s))),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "full_name")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub scholarship_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    #[serde(deserialize_with = "id")]
    pub student_id: StudentId,
    #[serde(deserialize_with = "id")]
    pub course_id: CourseId,
}

#[derive(Debug, Deserialize)]
pub struct InstallmentRequest {
    pub email: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(deserialize_with = "id")]
    pub student_id: StudentId,
    #[serde(deserialize_with = "id")]
    pub course_id: CourseId,
    pub grade_points: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CertificateQuery {
    pub email: String,
    #[serde(deserialize_with = "id")]
    pub course_id: CourseId,
}
