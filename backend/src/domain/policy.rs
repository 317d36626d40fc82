// src/domain/policy.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Account role, stored and transmitted as `STUDENT` / `LECTURER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Lecturer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Lecturer => "LECTURER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Role::Student),
            "LECTURER" => Ok(Role::Lecturer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Identity of the caller, passed explicitly into every kernel decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Operations guarded by the policy. Owner ids are those of the target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewAssignment,
    CreateAssignment,
    /// Update or delete an assignment.
    ManageAssignment { lecturer_id: i64 },
    CreateSubmission,
    /// Grade answers, list or delete submissions of an assignment.
    GradeSubmission { lecturer_id: i64 },
    /// Read a single submission or answer.
    ViewSubmission { student_id: i64, lecturer_id: i64 },
    ListUsers,
    /// Remove an account. `role` is the target's.
    DeleteUser { user_id: i64, role: Role },
}

/// Decides whether `session` may perform `action`.
///
/// Denials carry no detail beyond `Forbidden`.
pub fn authorize(session: &Session, action: Action) -> Result<(), DomainError> {
    let allowed = match action {
        Action::ViewAssignment => true,
        Action::CreateAssignment | Action::ListUsers => session.role == Role::Lecturer,
        Action::ManageAssignment { lecturer_id } | Action::GradeSubmission { lecturer_id } => {
            session.role == Role::Lecturer && session.user_id == lecturer_id
        }
        Action::CreateSubmission => session.role == Role::Student,
        Action::DeleteUser { user_id, role } => {
            session.role == Role::Lecturer
                && (role == Role::Student || user_id == session.user_id)
        }
        Action::ViewSubmission {
            student_id,
            lecturer_id,
        } => match session.role {
            Role::Student => session.user_id == student_id,
            Role::Lecturer => session.user_id == lecturer_id,
        },
    };

    if allowed {
        Ok(())
    } else {
        tracing::debug!(
            user_id = session.user_id,
            role = %session.role,
            ?action,
            "access denied"
        );
        Err(DomainError::Forbidden)
    }
}
