use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::JwtConfig;
use crate::db::models::User;
use crate::db::repository::UserRepository;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> AppResult<String> {
        Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    /// Issue a session JWT for a user id.
    pub fn create_jwt(jwt: &JwtConfig, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::hours(jwt.expiration_hours)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Decode and validate a session JWT. Expiry is checked by the default
    /// validation; any failure surfaces as Unauthorized at the response layer.
    pub fn decode_jwt(jwt: &JwtConfig, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Resolve a bearer token to its user. A valid token whose user has since
    /// been deleted is Unauthorized, not an internal error.
    pub async fn get_user_from_token(
        pool: &SqlitePool,
        jwt: &JwtConfig,
        token: &str,
    ) -> AppResult<User> {
        let claims = Self::decode_jwt(jwt, token)?;

        UserRepository::find_by_id(pool, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 24,
        }
    }

    #[test]
    fn jwt_round_trip_preserves_subject() {
        let cfg = jwt_config();
        let token = AuthService::create_jwt(&cfg, "user-123").unwrap();
        let claims = AuthService::decode_jwt(&cfg, &token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn jwt_with_wrong_secret_is_rejected() {
        let cfg = jwt_config();
        let token = AuthService::create_jwt(&cfg, "user-123").unwrap();

        let other = JwtConfig {
            secret: "different-secret".to_string(),
            expiration_hours: 24,
        };
        assert!(AuthService::decode_jwt(&other, &token).is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = AuthService::hash_password("hunter2!").unwrap();
        assert!(AuthService::verify_password("hunter2!", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong", &hash).unwrap());
    }
}
