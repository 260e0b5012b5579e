// User lifecycle service - business logic layer

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::models::Role;
use crate::auth::repository::RoleRepository;
use crate::storage::ImageStore;
use crate::users::age::age_from_birthdate;
use crate::users::error::UserError;
use crate::users::models::{NewUser, RequestOrigin, User, UserForm, UserView};
use crate::users::repository::{FileRepository, UserRepository};

/// Only admins create users
fn can_create(actor: &AuthenticatedUser) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::User => false,
    }
}

/// Admins update anyone; everyone else only themselves
fn can_update(actor: &AuthenticatedUser, target_id: i32) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::User => actor.user_id == target_id,
    }
}

/// Only admins delete users
fn can_delete(actor: &AuthenticatedUser) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::User => false,
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, UserError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UserError::Validation(message.to_string()))
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    file_repo: Arc<dyn FileRepository>,
    images: Arc<dyn ImageStore>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        file_repo: Arc<dyn FileRepository>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            file_repo,
            images,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Create a user with its image, admin only
    pub async fn create_user(
        &self,
        actor: &AuthenticatedUser,
        form: UserForm,
        origin: &RequestOrigin,
    ) -> Result<UserView, UserError> {
        if !can_create(actor) {
            warn!("User {} with role '{}' tried to create a user", actor.user_id, actor.role);
            return Err(UserError::PermissionDenied);
        }

        let name = required(form.name, "name is required")?;
        let birthdate = required(form.birthdate, "birthdate is required")?;
        let image = form
            .image
            .ok_or_else(|| UserError::Validation("image is required".to_string()))?;
        let age = age_from_birthdate(&birthdate, Self::today())?;

        let role = self
            .role_repo
            .find_by_role(Role::DEFAULT)
            .await?
            .ok_or(UserError::DefaultRoleMissing)?;

        let image_name = self.images.save(&image.file_name, image.bytes).await?;
        debug!("Saved image {} for new user {}", image_name, name);

        let new_user = NewUser {
            name,
            email: None,
            password_hash: None,
            age,
            image_name: Some(image_name.clone()),
            role_id: role.id,
        };

        let user = match self.user_repo.create_with_file(new_user, &image_name).await {
            Ok((user, _file)) => user,
            Err(e) => {
                self.discard_image(&image_name).await;
                return Err(e.into());
            }
        };

        info!("User {} created by admin {}", user.id, actor.user_id);
        Ok(UserView::from_user(&user, origin))
    }

    pub async fn get_all_users(&self, origin: &RequestOrigin) -> Result<Vec<UserView>, UserError> {
        let users = self.user_repo.find_all().await?;
        Ok(users.iter().map(|u| UserView::from_user(u, origin)).collect())
    }

    pub async fn get_user(&self, id: i32, origin: &RequestOrigin) -> Result<UserView, UserError> {
        let user = self.find_user(id).await?;
        Ok(UserView::from_user(&user, origin))
    }

    /// Update name and birthdate, optionally replacing the image
    ///
    /// The file record and user row change together; the old image is
    /// removed only after both are committed.
    pub async fn update_user(
        &self,
        actor: &AuthenticatedUser,
        target_id: i32,
        form: UserForm,
        origin: &RequestOrigin,
    ) -> Result<UserView, UserError> {
        if !can_update(actor, target_id) {
            warn!(
                "User {} with role '{}' tried to update user {}",
                actor.user_id, actor.role, target_id
            );
            return Err(UserError::PermissionDenied);
        }

        let mut user = self.find_user(target_id).await?;

        let name = required(form.name, "name is required")?;
        let birthdate = required(form.birthdate, "birthdate is required")?;
        let age = age_from_birthdate(&birthdate, Self::today())?;

        user.name = name;
        user.age = age;

        let updated = match form.image {
            Some(image) => {
                let new_name = self.images.save(&image.file_name, image.bytes).await?;
                let old_name = user.image_name.replace(new_name.clone());

                let updated = match self.user_repo.update_with_file(&user, &new_name).await {
                    Ok(Some(updated)) => updated,
                    Ok(None) => {
                        self.discard_image(&new_name).await;
                        return Err(UserError::NotFound);
                    }
                    Err(e) => {
                        self.discard_image(&new_name).await;
                        return Err(e.into());
                    }
                };

                if let Some(old) = old_name.filter(|old| *old != new_name) {
                    if let Err(e) = self.images.delete(&old).await {
                        warn!("Failed to remove replaced image {}: {}", old, e);
                    }
                }
                updated
            }
            None => self
                .user_repo
                .update(&user)
                .await?
                .ok_or(UserError::NotFound)?,
        };

        info!("User {} updated by user {}", updated.id, actor.user_id);
        Ok(UserView::from_user(&updated, origin))
    }

    /// Delete the file records, the user, then the stored image
    pub async fn delete_user(&self, actor: &AuthenticatedUser, target_id: i32) -> Result<(), UserError> {
        if !can_delete(actor) {
            warn!(
                "User {} with role '{}' tried to delete user {}",
                actor.user_id, actor.role, target_id
            );
            return Err(UserError::PermissionDenied);
        }

        let user = self.find_user(target_id).await?;

        let removed = self.file_repo.delete_by_user_id(user.id).await?;
        debug!("Removed {} file record(s) for user {}", removed, user.id);

        if !self.user_repo.delete(user.id).await? {
            return Err(UserError::NotFound);
        }

        if let Some(image) = user.image_name.as_deref() {
            if let Err(e) = self.images.delete(image).await {
                warn!("Failed to remove image {} of deleted user {}: {}", image, user.id, e);
            }
        }

        info!("User {} deleted by admin {}", user.id, actor.user_id);
        Ok(())
    }

    async fn find_user(&self, id: i32) -> Result<User, UserError> {
        self.user_repo.find_by_id(id).await?.ok_or(UserError::NotFound)
    }

    /// Remove an image that never made it into the database
    async fn discard_image(&self, name: &str) {
        if let Err(e) = self.images.delete(name).await {
            warn!("Failed to remove unrecorded image {}: {}", name, e);
        }
    }
}
