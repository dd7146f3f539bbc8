//! Application layer: the registrar service and the document generators.
//!
//! `Registrar` orchestrates the store and the payment gateway; it owns no
//! state of its own, so a single instance is shared by every request.

pub mod documents;
pub mod registrar;
