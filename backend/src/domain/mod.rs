// src/domain/mod.rs

//! Storage-free assignment kernel: lifecycle, submission assembly, grading and access policy.

pub mod error;
pub mod grading;
pub mod lifecycle;
pub mod policy;
pub mod submission;

pub use error::{DomainError, FieldError};
pub use lifecycle::AssignmentState;
pub use policy::{Action, Role, Session};
