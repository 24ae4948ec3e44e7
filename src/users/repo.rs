use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{StoreError, StoreResult};
use crate::users::repo_types::{NewUser, User, UserChanges};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// All users ordered by creation; inactive ones only when asked for.
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<User>>;
    async fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn create(&self, new: NewUser) -> StoreResult<User>;
    async fn update(&self, uuid: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn set_active(&self, uuid: Uuid, active: bool) -> StoreResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE is_active OR $1
            ORDER BY created_at, id
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uuid, name, username, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "username"))
    }

    async fn update(&self, uuid: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   username = COALESCE($3, username),
                   password_hash = COALESCE($4, password_hash),
                   role = COALESCE($5, role),
                   updated_at = now()
             WHERE uuid = $1
            RETURNING id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(uuid)
        .bind(changes.name)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(changes.role)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "username"))
    }

    async fn set_active(&self, uuid: Uuid, active: bool) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_active = $2, updated_at = now()
             WHERE uuid = $1
            RETURNING id, uuid, name, username, password_hash, role, is_active, created_at, updated_at
            "#,
        )
        .bind(uuid)
        .bind(active)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}
