pub mod auth;
pub use self::auth::{login, logout, resend, sign_up, verify};

pub mod health;
pub use self::health::health;
