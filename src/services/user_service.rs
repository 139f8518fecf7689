use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::users::{AddAddressRequest, ProfileResponse, UpdateProfileRequest, UserList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Address, User},
    response::ApiResponse,
    services::auth_service::{hash_password, password_matches},
};

pub async fn get_profile(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<ProfileResponse>> {
    let addresses = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user.id())
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "Ok",
        ProfileResponse {
            user: user.user.clone(),
            addresses,
        },
    ))
}

pub async fn update_profile(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let UpdateProfileRequest {
        name,
        email,
        phone,
        current_password,
        new_password,
    } = payload;
    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(AppError::BadRequest("Name and email are required".into()));
    }
    let phone = phone.unwrap_or_default();

    // A password change is only honored when the caller proves the current one.
    let new_hash = match new_password.filter(|p| !p.is_empty()) {
        Some(new_password) => {
            let current = current_password
                .ok_or_else(|| AppError::BadRequest("Current password is incorrect".into()))?;
            let stored: (String,) =
                sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
                    .bind(user.id())
                    .fetch_one(pool)
                    .await?;
            if !password_matches(&current, &stored.0) {
                return Err(AppError::BadRequest("Current password is incorrect".into()));
            }
            Some(hash_password(&new_password)?)
        }
        None => None,
    };

    let updated: User = match new_hash {
        Some(hash) => {
            sqlx::query_as(
                r#"
                UPDATE users SET name = $1, email = $2, phone = $3, password_hash = $4, updated_at = NOW()
                WHERE id = $5
                RETURNING id, name, email, phone, role, created_at
                "#,
            )
            .bind(name.as_str())
            .bind(email.as_str())
            .bind(phone.as_str())
            .bind(hash)
            .bind(user.id())
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                UPDATE users SET name = $1, email = $2, phone = $3, updated_at = NOW()
                WHERE id = $4
                RETURNING id, name, email, phone, role, created_at
                "#,
            )
            .bind(name.as_str())
            .bind(email.as_str())
            .bind(phone.as_str())
            .bind(user.id())
            .fetch_one(pool)
            .await?
        }
    };

    Ok(ApiResponse::success("Profile updated", updated))
}

pub async fn add_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    if payload.is_default.unwrap_or(false) {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
            .bind(user.id())
            .execute(pool)
            .await?;
    }

    let address: Address = sqlx::query_as(
        r#"
        INSERT INTO addresses (id, user_id, type, name, street, city, state, zip, country, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id())
    .bind(payload.kind.unwrap_or_else(|| "Home".into()))
    .bind(payload.name.unwrap_or_default())
    .bind(payload.street)
    .bind(payload.city)
    .bind(payload.state)
    .bind(payload.zip)
    .bind(payload.country.unwrap_or_else(|| "India".into()))
    .bind(payload.is_default.unwrap_or(false))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Address added", address))
}

pub async fn delete_address(
    pool: &DbPool,
    user: &AuthUser,
    address_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user.id())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Address not found".into()));
    }

    Ok(ApiResponse::success(
        "Address removed",
        serde_json::json!({}),
    ))
}

pub async fn list_users(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;

    let items = sqlx::query_as::<_, User>(
        "SELECT id, name, email, phone, role, created_at FROM users ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let count = items.len() as i64;
    Ok(ApiResponse::success("Users", UserList { count, items }))
}
