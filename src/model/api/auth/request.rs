use argon2::Config as HashConfig;
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::model::{
    common::voter::{Region, Role},
    db::voter::NewVoter,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const NATIONAL_ID_LENGTH: usize = 13;

/// A membership registration, received from a user. Never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub registration_number: String,
    pub national_id: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: NaiveDate,
    pub department: u32,
    pub municipality: u32,
    #[serde(default)]
    pub specialty: Option<String>,
}

/// Reasons a registration is refused before touching the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRegistration {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("National ID must be exactly {NATIONAL_ID_LENGTH} digits")]
    NationalIdFormat,
    #[error("Email address is malformed")]
    EmailFormat,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("Department and municipality must be set")]
    MissingRegion,
}

impl Registration {
    /// Check every field is present and well-formed.
    pub fn validate(&self) -> Result<(), InvalidRegistration> {
        for (field, value) in [
            ("name", &self.name),
            ("registration_number", &self.registration_number),
            ("national_id", &self.national_id),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(InvalidRegistration::MissingField(field));
            }
        }
        if self.national_id.len() != NATIONAL_ID_LENGTH
            || !self.national_id.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidRegistration::NationalIdFormat);
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(InvalidRegistration::EmailFormat),
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(InvalidRegistration::PasswordTooShort);
        }
        if self.department == 0 || self.municipality == 0 {
            return Err(InvalidRegistration::MissingRegion);
        }
        Ok(())
    }

    /// Validate this registration and turn it into a storable voter by hashing the password.
    pub fn into_voter(self, role: Role, now: DateTime<Utc>) -> Result<NewVoter, Error> {
        self.validate()?;

        // 16 bytes is the recommended salt length for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(self.password.as_bytes(), &salt, &HashConfig::default())?;

        Ok(NewVoter {
            name: self.name.trim().to_string(),
            registration_number: self.registration_number.trim().to_string(),
            national_id: self.national_id,
            email: self.email.trim().to_lowercase(),
            date_of_birth: self.date_of_birth,
            password_hash,
            region: Region {
                department: self.department,
                municipality: self.municipality,
            },
            specialty: self.specialty.filter(|s| !s.trim().is_empty()),
            role,
            registered_at: now,
            has_fully_voted: false,
            completed_scopes: Vec::new(),
            ledger_seq: 0,
        })
    }
}

/// Login credentials. All four must match the stored member.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub registration_number: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    pub password: String,
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Registration {
        pub fn example() -> Self {
            Self {
                name: "Ana Morales".to_string(),
                registration_number: "CIV-10001".to_string(),
                national_id: "1234567890101".to_string(),
                email: "ana.morales@example.org".to_string(),
                password: "structural-steel".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1985, 4, 12).unwrap(),
                department: 1,
                municipality: 101,
                specialty: Some("Civil engineering".to_string()),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Luis Herrera".to_string(),
                registration_number: "ELE-20002".to_string(),
                national_id: "9876543210202".to_string(),
                email: "luis.herrera@example.org".to_string(),
                password: "three-phase-power".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1979, 11, 3).unwrap(),
                department: 2,
                municipality: 205,
                specialty: None,
            }
        }

        /// Registration number listed as an administrator in the test config.
        pub fn admin_example() -> Self {
            Self {
                name: "Marta Díaz".to_string(),
                registration_number: "ADM-00001".to_string(),
                national_id: "5555555555501".to_string(),
                email: "marta.diaz@example.org".to_string(),
                password: "board-secretary".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1970, 1, 30).unwrap(),
                department: 1,
                municipality: 101,
                specialty: None,
            }
        }

        pub fn login(&self) -> LoginRequest {
            LoginRequest {
                registration_number: self.registration_number.clone(),
                national_id: self.national_id.clone(),
                date_of_birth: self.date_of_birth,
                password: self.password.clone(),
            }
        }
    }
}
