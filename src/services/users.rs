use crate::{
    auth::{hash_password, verify_password, AuthError},
    db::DbPool,
    entities::{site, user, user_site},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

fn validate_role(role: &str) -> Result<(), validator::ValidationError> {
    match role {
        user::ROLE_ADMIN | user::ROLE_USER => Ok(()),
        _ => Err(validator::ValidationError::new("unknown_role")),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 64, message = "Username must be 3 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(custom = "validate_role")]
    pub role: String,
    pub site_ids: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSite {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Public view of a user with its site assignments
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub user_id: i32,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub site_ids: Vec<i32>,
}

/// Looks up the display name of a user, if the user still exists.
pub async fn display_name<C>(conn: &C, user_id: i32) -> Result<Option<String>, DbErr>
where
    C: ConnectionTrait,
{
    Ok(user::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .map(|u| u.display_name))
}

/// Users, sites and their assignments
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_site(&self, request: NewSite) -> Result<site::Model, ServiceError> {
        request.validate()?;

        let site = site::ActiveModel {
            code: Set(request.code.trim().to_string()),
            name: Set(request.name.trim().to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create site");
            ServiceError::DatabaseError(e)
        })?;

        info!(site_id = site.site_id, "Site created");
        Ok(site)
    }

    pub async fn list_sites(&self) -> Result<Vec<site::Model>, ServiceError> {
        Ok(site::Entity::find()
            .order_by_asc(site::Column::SiteId)
            .all(&*self.db_pool)
            .await?)
    }

    /// Creates a user and assigns its sites in one transaction
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: NewUser) -> Result<UserProfile, ServiceError> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for user creation");
            ServiceError::DatabaseError(e)
        })?;

        let created = user::ActiveModel {
            username: Set(request.username.trim().to_string()),
            display_name: Set(request.display_name.trim().to_string()),
            password_hash: Set(password_hash),
            role: Set(request.role.clone()),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut site_ids = request.site_ids.clone();
        site_ids.sort_unstable();
        site_ids.dedup();
        for site_id in &site_ids {
            Self::insert_assignment(&txn, created.user_id, *site_id).await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit user creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = created.user_id, sites = ?site_ids, "User created");
        Ok(UserProfile {
            user_id: created.user_id,
            username: created.username,
            display_name: created.display_name,
            role: created.role,
            site_ids,
        })
    }

    async fn insert_assignment<C>(conn: &C, user_id: i32, site_id: i32) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if site::Entity::find_by_id(site_id).one(conn).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Site {site_id} not found")));
        }
        user_site::ActiveModel {
            user_id: Set(user_id),
            site_id: Set(site_id),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn assign_site(&self, user_id: i32, site_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        if user::Entity::find_by_id(user_id).one(db).await?.is_none() {
            return Err(ServiceError::NotFound(format!("User {user_id} not found")));
        }
        if self.site_ids_for(user_id).await?.contains(&site_id) {
            return Ok(());
        }
        Self::insert_assignment(db, user_id, site_id).await
    }

    #[instrument(skip(self))]
    pub async fn revoke_site(&self, user_id: i32, site_id: i32) -> Result<(), ServiceError> {
        user_site::Entity::delete_many()
            .filter(user_site::Column::UserId.eq(user_id))
            .filter(user_site::Column::SiteId.eq(site_id))
            .exec(&*self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn site_ids_for(&self, user_id: i32) -> Result<Vec<i32>, ServiceError> {
        Ok(user_site::Entity::find()
            .select_only()
            .column(user_site::Column::SiteId)
            .filter(user_site::Column::UserId.eq(user_id))
            .order_by_asc(user_site::Column::SiteId)
            .into_tuple::<i32>()
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username.trim()))
            .one(&*self.db_pool)
            .await?)
    }

    pub async fn profile(&self, user_id: i32) -> Result<UserProfile, ServiceError> {
        let found = user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))?;
        let site_ids = self.site_ids_for(user_id).await?;
        Ok(UserProfile {
            user_id: found.user_id,
            username: found.username,
            display_name: found.display_name,
            role: found.role,
            site_ids,
        })
    }

    /// Checks a username and password pair.
    ///
    /// Unknown users, inactive users and wrong passwords all yield the same error.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(user::Model, Vec<i32>), ServiceError> {
        let Some(found) = self.find_by_username(username).await? else {
            warn!("login with unknown username");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !found.active || !verify_password(password, &found.password_hash)? {
            warn!(user_id = found.user_id, "login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        let site_ids = self.site_ids_for(found.user_id).await?;
        Ok((found, site_ids))
    }

    #[instrument(skip(self, password))]
    pub async fn set_password(&self, username: &str, password: &str) -> Result<(), ServiceError> {
        if password.chars().count() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let found = self
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {username} not found")))?;

        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(hash_password(password)?);
        active.update(&*self.db_pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, username: &str, is_active: bool) -> Result<(), ServiceError> {
        let found = self
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {username} not found")))?;

        let mut active: user::ActiveModel = found.into();
        active.active = Set(is_active);
        active.update(&*self.db_pool).await?;
        Ok(())
    }
}
