use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Passenger => "passenger",
            Role::Driver => "driver",
            Role::Admin => "admin",
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
        match s.to_ascii_lowercase().as_str() {
            "passenger" | "user" => Ok(Role::Passenger),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role '{}'", s)),
        }
    }
}

/// Authenticated caller, as handed to the core by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn passenger(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Passenger)
    }

    pub fn driver(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Driver)
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, role: Role) -> Result<(), BookingError> {
        if self.role != role {
            return Err(BookingError::Forbidden(format!(
                "this action requires the {} role",
                role
            )));
        }
        Ok(())
    }
}
