//! Database queries for user accounts.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entity::user::{self, ActiveModel, Entity as User};
use crate::error::{AppError, AppResult};
use crate::models::UserRole;

use super::DbPool;

/// Columns accepted by profile updates. None leaves the column untouched.
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
}

impl DbPool {
    /// Insert a new user account.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        department: Option<&str>,
        title: Option<&str>,
        role: UserRole,
    ) -> AppResult<user::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(id),
            email: Set(email.to_lowercase()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            department: Set(department.map(|s| s.to_string())),
            title: Set(title.map(|s| s.to_string())),
            role: Set(role.as_str().to_string()),
            is_active: Set(true),
            is_verified: Set(false),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert user: {}", e)))?;

        Ok(result)
    }

    /// Get a user by ID.
    pub async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<user::Model>> {
        let result = User::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))?;

        Ok(result)
    }

    /// Get a user by email address (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        let result = User::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user by email: {}", e)))?;

        Ok(result)
    }

    /// Check whether an email or username is already taken.
    pub async fn user_exists(&self, email: &str, username: &str) -> AppResult<bool> {
        let result = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(email.to_lowercase()))
                    .add(user::Column::Username.eq(username)),
            )
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to check user existence: {}", e)))?;

        Ok(result.is_some())
    }

    /// Record a successful login.
    pub async fn update_last_login(&self, id: Uuid) -> AppResult<()> {
        let user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let mut active: ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now()));

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update last login: {}", e)))?;

        Ok(())
    }

    /// Apply profile changes to a user.
    pub async fn update_user_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> AppResult<user::Model> {
        let user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let mut active: ActiveModel = user.into();
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(department) = changes.department {
            active.department = Set(Some(department));
        }
        if let Some(title) = changes.title {
            active.title = Set(Some(title));
        }

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update user profile: {}", e)))?;

        Ok(result)
    }

    /// Replace a user's password hash.
    pub async fn update_user_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let mut active: ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_string());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update password: {}", e)))?;

        Ok(())
    }
}
