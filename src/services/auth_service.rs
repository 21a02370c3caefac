use std::sync::Arc;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;

use crate::{
    audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_USER},
    models::User,
    store::{NewUser, Store, UserStore},
};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: Arc<str>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub async fn register(&self, payload: RegisterRequest) -> AppResult<User> {
        let RegisterRequest { email, password } = payload;
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::BadRequest("email is invalid".into()));
        }
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "password must be at least 8 characters".into(),
            ));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::BadRequest("Email is already taken".to_string()));
        }

        let password_hash = hash_password(&password)?;
        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                role: ROLE_USER.to_string(),
            })
            .await?;

        audit::record(
            self.store.as_ref(),
            Some(user.id),
            "user_register",
            "users",
            serde_json::json!({ "user_id": user.id }),
        )
        .await;

        Ok(user)
    }

    pub async fn login(&self, payload: LoginRequest) -> AppResult<LoginResponse> {
        let LoginRequest { email, password } = payload;
        let user = match self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?
        {
            Some(u) => u,
            None => return Err(AppError::BadRequest("Invalid email or password".into())),
        };

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Err(AppError::BadRequest("Invalid email or password".into()));
        }

        let token = self.issue_token(&user)?;

        audit::record(
            self.store.as_ref(),
            Some(user.id),
            "user_login",
            "users",
            serde_json::json!({ "user_id": user.id }),
        )
        .await;

        Ok(LoginResponse {
            token: format!("Bearer {}", token),
        })
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::hours(24))
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            exp: expiration.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
    }

    /// Resolves a bearer token to the caller identity.
    pub fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = uuid::Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role,
        })
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}
