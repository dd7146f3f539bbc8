//! Domain model: value objects, aggregates and the ports the application
//! layer drives.

pub mod course;
pub mod document;
pub mod enrollment;
pub mod money;
pub mod payment;
pub mod ports;
pub mod student;
