//! `userverse-users` — user accounts and the password-reset flow.

pub mod account;
pub mod password_reset;

pub use account::{AccountService, ProfileUpdate, Registration};
pub use password_reset::PasswordResetService;
