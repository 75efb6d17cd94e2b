//! Password reset by one-time password.
//!
//! A request stores a hashed OTP ticket in the user's primary metadata and
//! sends the plaintext code out through the notification queue. The code is
//! accepted once, within the configured time window, and the ticket is
//! burned after too many wrong guesses.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use userverse_auth::{generate_otp, hash_password, verify_password};
use userverse_core::{
    DomainError, DomainResult, Entity, MetadataEntry, MetadataField, PasswordResetTicket, User,
    UserChanges,
};
use userverse_infra::config::PasswordResetConfig;
use userverse_infra::{Database, Notification, NotificationQueue};

#[derive(Clone)]
pub struct PasswordResetService {
    db: Arc<dyn Database>,
    notifications: NotificationQueue,
    otp_ttl: Duration,
    otp_length: usize,
    max_attempts: u32,
}

impl PasswordResetService {
    pub fn new(
        db: Arc<dyn Database>,
        notifications: NotificationQueue,
        config: &PasswordResetConfig,
    ) -> Self {
        Self {
            db,
            notifications,
            otp_ttl: Duration::minutes(config.otp_ttl_minutes),
            otp_length: config.otp_length,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Issue a fresh OTP, replacing any earlier ticket.
    #[instrument(skip(self), err)]
    pub async fn request_reset(&self, email: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let otp = generate_otp(self.otp_length);
        let ticket = PasswordResetTicket {
            otp_hash: hash_password(&otp)?,
            created_at: now,
            consumed_at: None,
            failed_attempts: 0,
        };

        let mut tx = self.db.begin().await?;
        let user = active_user_by_email(tx.find_user_by_email(email.trim()).await?, email)?;
        tx.set_user_metadata(user.id, MetadataField::Primary, MetadataEntry::PasswordReset(ticket))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.id, "password reset requested");
        self.notifications.publish(Notification::PasswordResetRequested {
            user_id: user.id,
            email: user.email,
            otp,
        });
        Ok(())
    }

    /// Replace the password if `otp` matches an unused, unexpired ticket.
    #[instrument(skip(self, otp, new_password), err)]
    pub async fn reset_with_otp(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        if new_password.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }

        let mut tx = self.db.begin().await?;
        let user = active_user_by_email(tx.find_user_by_email(email.trim()).await?, email)?;

        let mut ticket = user
            .metadata
            .primary()
            .password_reset()
            .ok_or_else(|| DomainError::validation("no password reset was requested"))?;
        if ticket.failed_attempts >= self.max_attempts {
            return Err(DomainError::validation(
                "too many failed attempts; request a new one-time password",
            ));
        }
        if ticket.consumed_at.is_some() {
            return Err(DomainError::validation("one-time password has already been used"));
        }
        if now - ticket.created_at >= self.otp_ttl {
            return Err(DomainError::validation("one-time password has expired"));
        }
        if !verify_password(otp.trim(), &ticket.otp_hash)? {
            ticket.failed_attempts += 1;
            if ticket.failed_attempts >= self.max_attempts {
                ticket.consumed_at = Some(now);
            }
            warn!(user_id = %user.id, failed_attempts = ticket.failed_attempts, "wrong one-time password");
            // The miss is recorded even though the call fails.
            tx.set_user_metadata(user.id, MetadataField::Primary, MetadataEntry::PasswordReset(ticket))
                .await?;
            tx.commit().await?;
            return Err(DomainError::validation("invalid one-time password"));
        }

        tx.update_user(
            user.id,
            UserChanges {
                password_hash: Some(hash_password(new_password)?),
                ..UserChanges::default()
            },
        )
        .await?;
        ticket.consumed_at = Some(now);
        let user = tx
            .set_user_metadata(user.id, MetadataField::Primary, MetadataEntry::PasswordReset(ticket))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.id, "password reset completed");
        Ok(user)
    }
}

fn active_user_by_email(user: Option<User>, email: &str) -> DomainResult<User> {
    user.filter(|u| u.is_active())
        .ok_or_else(|| DomainError::not_found(format!("user with email {email}")))
}
