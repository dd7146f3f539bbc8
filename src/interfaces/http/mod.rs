//! The JSON-over-HTTP API.
//!
//! Handlers are thin: they decode the request, call the [`Registrar`], and
//! shape the answer. Every failure is rendered as
//! `{"status": "error", "message": ...}` by `RegistryError`'s `IntoResponse`.

pub mod error;
pub mod requests;

use crate::application::registrar::{Registrar, Registration};
use crate::domain::course::NewCourse;
use crate::domain::document::Document;
use crate::domain::student::Degree;
use crate::error::{RegistryError, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use requests::{
    CertificateQuery, CompleteRequest, EmailQuery, EnrollRequest, InstallmentRequest,
    RegisterRequest,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const HOME_PAGE: &str = include_str!("home.html");

#[derive(Clone)]
pub struct AppState {
    pub registrar: Arc<Registrar>,
    /// Bearer token for admin routes; `None` disables them.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(registrar: Registrar, admin_token: Option<String>) -> Self {
        Self {
            registrar: Arc::new(registrar),
            admin_token: admin_token
                .filter(|token| !token.is_empty())
                .map(Arc::from),
        }
    }

    fn require_admin(&self, headers: &HeaderMap) -> Result<()> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(RegistryError::Forbidden(
                "admin routes are disabled".to_string(),
            ));
        };
        let given = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        match given {
            Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            _ => Err(RegistryError::Unauthorized(
                "missing or invalid admin token".to_string(),
            )),
        }
    }
}

/// Builds the application router with request tracing and a per-request timeout.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/enroll", post(enroll))
        .route("/pay_installment", post(pay_installment))
        .route("/complete", post(complete))
        .route("/courses", get(list_courses).post(create_course))
        .route("/students", get(student))
        .route("/certificate", get(certificate))
        .route("/transcript", get(transcript))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = payload?;
    let degree = req
        .degree
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(str::parse::<Degree>)
        .transpose()?;
    let student = state
        .registrar
        .register(Registration {
            name: req.name,
            email: req.email,
            password: req.password,
            phone: req.phone,
            degree,
            scholarship_code: req.scholarship_code,
        })
        .await?;
    Ok(Json(json!({
        "status": "success",
        "student_id": student.id,
        "scholarship": student.scholarship,
    })))
}

async fn enroll(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = payload?;
    let receipt = state.registrar.enroll(req.student_id, req.course_id).await?;
    Ok(Json(json!({
        "status": "enrolled",
        "payment_status": receipt.payment_status(),
        "enrollment": receipt.enrollment,
    })))
}

async fn pay_installment(
    State(state): State<AppState>,
    payload: std::result::Result<Json<InstallmentRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = payload?;
    let receipt = state
        .registrar
        .pay_installment_by_email(&req.email, req.amount)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "subscription_expires_at": receipt.subscription_expires_at,
        "next_payment_due": receipt.next_payment_due,
        "tuition_paid": receipt.tuition_paid,
    })))
}

async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    state.require_admin(&headers)?;
    let Json(req) = payload?;
    let student = state
        .registrar
        .complete_enrollment(req.student_id, req.course_id, req.grade_points)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "credits_earned": student.credits_earned,
        "gpa": student.gpa(),
    })))
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Value>> {
    let courses = state.registrar.list_courses().await?;
    Ok(Json(json!(courses)))
}

async fn create_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewCourse>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    state.require_admin(&headers)?;
    let Json(course) = payload?;
    let course = state.registrar.add_course(course).await?;
    Ok((StatusCode::CREATED, Json(json!(course))))
}

async fn student(
    State(state): State<AppState>,
    query: std::result::Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(query) = query?;
    let student = state.registrar.student_by_email(&query.email).await?;
    let mut summary = json!(student);
    summary["gpa"] = json!(student.gpa());
    Ok(Json(summary))
}

async fn certificate(
    State(state): State<AppState>,
    query: std::result::Result<Query<CertificateQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let document = state
        .registrar
        .certificate(&query.email, query.course_id)
        .await?;
    Ok(attachment(document))
}

async fn transcript(
    State(state): State<AppState>,
    query: std::result::Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let document = state.registrar.transcript(&query.email).await?;
    Ok(attachment(document))
}

fn attachment(document: Document) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    let mut response = document.body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(document.content_type),
    );
    // File names are slugs, so this only fails on a bug in the generator.
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
