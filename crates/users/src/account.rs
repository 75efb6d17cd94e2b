//! Account lifecycle: registration, login, profile updates, deactivation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use userverse_auth::{BasicCredentials, Hs256Jwt, IssuedToken, hash_password, verify_password};
use userverse_core::{
    DomainError, DomainResult, Entity, NewUser, Paginated, Pagination, User, UserChanges,
    UserCompany, UserCompanyFilter, UserId,
};
use userverse_infra::{Database, Notification, NotificationQueue};

const BAD_LOGIN: &str = "invalid email or password";

/// Profile fields supplied at registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Owner-editable fields. `password` is plaintext and hashed before storage.
#[derive(Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
}

impl core::fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("phone_number", &self.phone_number)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct AccountService {
    db: Arc<dyn Database>,
    jwt: Hs256Jwt,
    notifications: NotificationQueue,
}

impl AccountService {
    pub fn new(db: Arc<dyn Database>, jwt: Hs256Jwt, notifications: NotificationQueue) -> Self {
        Self {
            db,
            jwt,
            notifications,
        }
    }

    #[instrument(skip(self, credentials, profile), fields(email = %credentials.email), err)]
    pub async fn register(
        &self,
        credentials: &BasicCredentials,
        profile: Registration,
    ) -> DomainResult<User> {
        let email = validate_email(&credentials.email)?;
        validate_password(&credentials.password)?;
        let password_hash = hash_password(&credentials.password)?;

        let mut tx = self.db.begin().await?;
        let user = tx
            .insert_user(NewUser {
                first_name: profile.first_name,
                last_name: profile.last_name,
                email: email.to_string(),
                phone_number: profile.phone_number,
                password_hash,
            })
            .await?;
        tx.commit().await?;

        info!(user_id = %user.id, "user registered");
        self.notifications.publish(Notification::UserRegistered {
            user_id: user.id,
            email: user.email.clone(),
            display_name: user.display_name(),
        });
        Ok(user)
    }

    /// Exchange email and password for a bearer token.
    #[instrument(skip(self, credentials), fields(email = %credentials.email), err)]
    pub async fn login(
        &self,
        credentials: &BasicCredentials,
        now: DateTime<Utc>,
    ) -> DomainResult<IssuedToken> {
        let mut tx = self.db.begin().await?;
        let user = tx
            .find_user_by_email(credentials.email.trim())
            .await?
            .filter(|u| u.is_active());
        drop(tx);

        let Some(user) = user else {
            warn!("login for unknown or closed account");
            return Err(DomainError::unauthorized(BAD_LOGIN));
        };
        if !verify_password(&credentials.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(DomainError::unauthorized(BAD_LOGIN));
        }

        let token = self.jwt.issue(user.id, &user.email, now)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Active users only.
    pub async fn get_user(&self, id: UserId) -> DomainResult<User> {
        let mut tx = self.db.begin().await?;
        tx.get_user(id)
            .await?
            .filter(|u| u.is_active())
            .ok_or_else(|| DomainError::not_found(format!("user {id}")))
    }

    #[instrument(skip(self), err)]
    pub async fn update_user(&self, id: UserId, update: ProfileUpdate) -> DomainResult<User> {
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };
        let changes = UserChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            phone_number: update.phone_number,
            password_hash,
        };
        if changes.is_empty() {
            return Err(DomainError::validation("no user fields to update"));
        }

        let mut tx = self.db.begin().await?;
        active_user(tx.get_user(id).await?, id)?;
        let user = tx.update_user(id, changes).await?;
        tx.commit().await?;

        info!(user_id = %id, "user updated");
        Ok(user)
    }

    /// Soft delete. Memberships are left as they are.
    #[instrument(skip(self), err)]
    pub async fn deactivate(&self, id: UserId) -> DomainResult<User> {
        let mut tx = self.db.begin().await?;
        active_user(tx.get_user(id).await?, id)?;
        let user = tx.close_user(id).await?;
        tx.commit().await?;

        info!(user_id = %id, "user deactivated");
        Ok(user)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn list_companies(
        &self,
        id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> DomainResult<Paginated<UserCompany>> {
        let mut tx = self.db.begin().await?;
        Ok(tx.list_companies_for_user(id, filter, page).await?)
    }
}

fn active_user(user: Option<User>, id: UserId) -> DomainResult<User> {
    user.filter(|u| u.is_active())
        .ok_or_else(|| DomainError::not_found(format!("user {id}")))
}

fn validate_email(email: &str) -> DomainResult<&str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation(format!("'{email}' is not a valid email"))),
    }
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.is_empty() {
        return Err(DomainError::validation("password must not be empty"));
    }
    Ok(())
}
