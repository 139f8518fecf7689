use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::DbPool,
    dto::auth::{
        AuthResponse, Claims, LoginRequest, OtpRequest, RegisterRequest, ResetPasswordRequest,
        VerifyOtpRequest,
    },
    error::{AppError, AppResult},
    mailer,
    models::User,
    response::ApiResponse,
    state::AppState,
};

// Full row including the password hash; never serialized, never leaves this
// module.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    role: String,
    created_at: chrono::DateTime<Utc>,
    password_hash: String,
}

impl UserRow {
    fn into_public(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

pub fn hash_password(raw: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub(crate) fn password_matches(raw: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

pub fn issue_token(user_id: Uuid, config: &AppConfig) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(config.jwt_expires_days))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    // Identity only: no role claim, so authorization always consults the
    // current user table.
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Token invalid or expired".into()))?;
    Ok(decoded.claims)
}

async fn find_user_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, phone, role, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let RegisterRequest {
        name,
        email,
        password,
    } = payload;
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("All fields are required".into()));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&password)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, phone, role, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.as_str())
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;

    let token = issue_token(user.id, &state.config)?;

    let to = user.email.clone();
    let user_name = user.name.clone();
    let mail = state.mailer.clone();
    mailer::dispatch(async move { mail.send_welcome(&to, &user_name).await });

    Ok(ApiResponse::success(
        "User registered",
        AuthResponse { token, user },
    ))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide email and password".into(),
        ));
    }

    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, name, email, phone, role, created_at, password_hash FROM users WHERE email = $1",
    )
    .bind(email.as_str())
    .fetch_optional(&state.pool)
    .await?;

    // One generic message for both unknown email and bad password, so the
    // endpoint cannot be used to enumerate accounts.
    let row = row.ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;
    if !password_matches(&password, &row.password_hash) {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let user = row.into_public();
    let token = issue_token(user.id, &state.config)?;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse { token, user },
    ))
}

pub async fn request_otp(
    state: &AppState,
    payload: OtpRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let email = payload.email;
    if email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }

    let user = find_user_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account found with this email".into()))?;

    let code = state.otp.issue(&email);

    let mail = state.mailer.clone();
    mailer::dispatch(async move { mail.send_login_code(&user.email, &user.name, &code).await });

    Ok(ApiResponse::success(
        "OTP sent to your email address",
        serde_json::json!({}),
    ))
}

pub async fn verify_otp(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let VerifyOtpRequest { email, otp } = payload;
    if email.trim().is_empty() || otp.trim().is_empty() {
        return Err(AppError::BadRequest("Email and OTP are required".into()));
    }

    state
        .otp
        .verify(&email, &otp)
        .map_err(|reason| AppError::Unauthorized(reason.to_string()))?;

    // The account can vanish between issuance and verification.
    let user = find_user_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let token = issue_token(user.id, &state.config)?;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse { token, user },
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: OtpRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let email = payload.email;
    if email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }

    let user = find_user_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account found with this email".into()))?;

    let code = state.otp.issue(&email);

    let mail = state.mailer.clone();
    mailer::dispatch(async move { mail.send_reset_code(&user.email, &user.name, &code).await });

    Ok(ApiResponse::success(
        "Password reset OTP sent to your email",
        serde_json::json!({}),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let ResetPasswordRequest {
        email,
        otp,
        new_password,
    } = payload;
    if email.trim().is_empty() || otp.trim().is_empty() || new_password.is_empty() {
        return Err(AppError::BadRequest(
            "Email, OTP and new password are required".into(),
        ));
    }

    state
        .otp
        .verify(&email, &otp)
        .map_err(|reason| AppError::Unauthorized(reason.to_string()))?;

    let password_hash = hash_password(&new_password)?;

    let updated: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE email = $2 RETURNING id",
    )
    .bind(password_hash)
    .bind(email.as_str())
    .fetch_optional(&state.pool)
    .await?;

    if updated.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    Ok(ApiResponse::success(
        "Password updated successfully",
        serde_json::json!({}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            jwt_expires_days: 7,
            db_min_connections: 1,
            db_max_connections: 1,
            mail: None,
        }
    }

    #[test]
    fn token_round_trips_subject() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, &config).unwrap();
        let claims = decode_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let config = test_config();
        let token = issue_token(Uuid::new_v4(), &config).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(password_matches("hunter2", &hash));
        assert!(!password_matches("hunter3", &hash));
    }
}
