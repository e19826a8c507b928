use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::Utc;
use color_eyre::eyre::eyre;
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::entities;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::validation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    /// Username or email
    pub identifier: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub user: entities::user::Model,
    pub token: String,
}

/// `len` random bytes, hex encoded.
fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Argon2id hash of `password` in PHC string format.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(eyre!("Failed to hash password: {e}")))
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {e}");
            false
        }
    }
}

pub struct AuthService {
    db: Arc<Database>,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(db: Arc<Database>, session_ttl_hours: i64) -> Self {
        Self {
            db,
            session_ttl_hours,
        }
    }

    /// Register a new account. The first account of an empty database becomes admin.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthSession> {
        let username = validation::normalize_username(&validation::required(
            "username",
            input.username.as_deref(),
        )?)?;
        let email =
            validation::normalize_email(&validation::required("email", input.email.as_deref())?)?;
        let password = input
            .password
            .ok_or_else(|| AppError::bad_request("password is required"))?;
        validation::check_password(&password)?;

        ensure_identity_available(&self.db, &username, &email, None).await?;

        let role = if entities::user::Entity::find()
            .count(&self.db.conn)
            .await?
            == 0
        {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password_hash = hash_password(&password)?;
        let user = entities::user::ActiveModel {
            username: Set(username),
            email: Set(email),
            display_name: Set(validation::optional(input.display_name)),
            role: Set(role),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(&self.db.conn)
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Registered user");

        let token = self.create_session(user.id).await?;
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, input: LoginInput) -> AppResult<AuthSession> {
        let identifier = validation::required("identifier", input.identifier.as_deref())?;
        let password = input
            .password
            .ok_or_else(|| AppError::bad_request("password is required"))?;

        let identifier = identifier.to_lowercase();
        let user = entities::user::Entity::find()
            .filter(
                Condition::any()
                    .add(entities::user::Column::Username.eq(identifier.as_str()))
                    .add(entities::user::Column::Email.eq(identifier.as_str())),
            )
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

        if !verify_password(&password, &user.password_hash) {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(AppError::unauthorized("Invalid credentials"));
        }

        let token = self.create_session(user.id).await?;
        Ok(AuthSession { user, token })
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        entities::session::Entity::delete_by_id(token.to_string())
            .exec(&self.db.conn)
            .await?;
        Ok(())
    }

    /// Resolve a bearer token to its user. Expired sessions are removed.
    pub async fn authenticate(&self, token: &str) -> AppResult<entities::user::Model> {
        let session = entities::session::Entity::find_by_id(token.to_string())
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or expired session"))?;

        if session.expires_at <= Utc::now().timestamp() {
            entities::session::Entity::delete_by_id(session.token)
                .exec(&self.db.conn)
                .await?;
            return Err(AppError::unauthorized("Invalid or expired session"));
        }

        entities::user::Entity::find_by_id(session.user_id)
            .one(&self.db.conn)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid or expired session"))
    }

    async fn create_session(&self, user_id: i64) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let token = random_hex(32);

        entities::session::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user_id),
            created_at: Set(now),
            expires_at: Set(now + self.session_ttl_hours * 3600),
        }
        .insert(&self.db.conn)
        .await?;

        Ok(token)
    }
}

/// Fail with 409 when the username or email belongs to another user.
pub(crate) async fn ensure_identity_available(
    db: &Database,
    username: &str,
    email: &str,
    except_user_id: Option<i64>,
) -> AppResult<()> {
    let mut query = entities::user::Entity::find().filter(
        Condition::any()
            .add(entities::user::Column::Username.eq(username))
            .add(entities::user::Column::Email.eq(email)),
    );
    if let Some(id) = except_user_id {
        query = query.filter(entities::user::Column::Id.ne(id));
    }

    if let Some(existing) = query.one(&db.conn).await? {
        let field = if existing.username == username {
            "username"
        } else {
            "email"
        };
        return Err(AppError::conflict(format!("{field} is already taken")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_db;

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some("correct horse".into()),
            display_name: None,
        }
    }

    #[test]
    fn test_password_hashes_are_salted_phc_strings() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));

        assert!(verify_password("secret123", &a));
        assert!(verify_password("secret123", &b));
        assert!(!verify_password("secret124", &a));
    }

    #[test]
    fn test_unreadable_hash_never_verifies() {
        assert!(!verify_password("secret123", ""));
        assert!(!verify_password("secret123", "5f4dcc3b5aa765d61d8327deb882cf99"));
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let db = test_db().await;
        let service = AuthService::new(db, 1);

        let first = service
            .register(register_input("Alice", "alice@example.com"))
            .await
            .unwrap();
        let second = service
            .register(register_input("bob", "bob@example.com"))
            .await
            .unwrap();

        assert_eq!(first.user.role, UserRole::Admin);
        assert_eq!(first.user.username, "alice");
        assert_eq!(second.user.role, UserRole::User);
        assert_eq!(first.token.len(), 64);
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let db = test_db().await;
        let service = AuthService::new(db, 1);
        service
            .register(register_input("alice", "alice@example.com"))
            .await
            .unwrap();

        let by_name = service
            .register(register_input("ALICE", "other@example.com"))
            .await;
        assert!(matches!(by_name, Err(AppError::Conflict(msg)) if msg.contains("username")));

        let by_email = service
            .register(register_input("other", "Alice@Example.com"))
            .await;
        assert!(matches!(by_email, Err(AppError::Conflict(msg)) if msg.contains("email")));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let db = test_db().await;
        let service = AuthService::new(db, 1);

        let mut input = register_input("alice", "alice@example.com");
        input.password = Some("short".into());
        assert!(matches!(
            service.register(input).await,
            Err(AppError::BadRequest(_))
        ));

        let mut input = register_input("alice", "alice@example.com");
        input.email = None;
        assert!(matches!(
            service.register(input).await,
            Err(AppError::BadRequest(msg)) if msg == "email is required"
        ));
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let db = test_db().await;
        let service = AuthService::new(db, 1);
        let registered = service
            .register(register_input("alice", "alice@example.com"))
            .await
            .unwrap();

        let session = service
            .login(LoginInput {
                identifier: Some("ALICE@example.com".into()),
                password: Some("correct horse".into()),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, registered.user.id);

        let user = service.authenticate(&session.token).await.unwrap();
        assert_eq!(user.id, registered.user.id);

        service.logout(&session.token).await.unwrap();
        assert!(matches!(
            service.authenticate(&session.token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let db = test_db().await;
        let service = AuthService::new(db, 1);
        service
            .register(register_input("alice", "alice@example.com"))
            .await
            .unwrap();

        let result = service
            .login(LoginInput {
                identifier: Some("alice".into()),
                password: Some("wrong password".into()),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let db = test_db().await;
        let service = AuthService::new(db.clone(), 0);
        let registered = service
            .register(register_input("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            service.authenticate(&registered.token).await,
            Err(AppError::Unauthorized(_))
        ));
        let remaining = entities::session::Entity::find()
            .count(&db.conn)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
