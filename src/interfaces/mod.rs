//! Adapters between the outside world and the registrar: the CSV course
//! import and the HTTP API.

pub mod csv;
pub mod http;
