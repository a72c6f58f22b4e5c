mod request;
mod token;
mod user;

pub use request::{
    InvalidRegistration, LoginRequest, Registration, MIN_PASSWORD_LENGTH, NATIONAL_ID_LENGTH,
};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
