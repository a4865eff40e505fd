use actix_web::http::header::{self, Header};
use actix_web::HttpRequest;
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header as JwtHeader, Validation};
use validator::Validate;

use crate::config::AppConfig;
use crate::models::auth::{
    AvatarImage, Claims, LoginRequest, LoginResponseData, NewUser, Principal, RegisterRequest,
    User, UserResponse,
};
use crate::models::image::UploadedImage;
use crate::repository::Repositories;
use crate::services::storage::ImageStorage;
use crate::utils::errors::ServiceError;

pub const AVATAR_KIND: &str = "avatarimage";

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    Ok(hash(password, DEFAULT_COST)?)
}

pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, ServiceError> {
    let now = Utc::now();
    let exp = (now + Duration::hours(config.jwt_expiration_hours)).timestamp() as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        exp,
        iat: now.timestamp() as usize,
    };

    encode(
        &JwtHeader::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| {
        log::error!("JWT encoding error: {}", e);
        ServiceError::InternalError("Failed to generate token".to_string())
    })
}

pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ServiceError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        log::warn!("JWT validation error: {}", e);
        ServiceError::Unauthorized("Invalid token".to_string())
    })
}

/// Token from `Authorization: Bearer <t>` or `Authorization: JWT <t>`.
fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Ok(auth) = Authorization::<Bearer>::parse(req) {
        return Some(auth.into_scheme().token().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("JWT "))
        .map(|t| t.trim().to_string())
}

/// Anonymous when no token is sent. A token that does not check out is an error, not anonymity.
pub async fn resolve_principal(
    req: &HttpRequest,
    config: &AppConfig,
    repos: &Repositories,
) -> Result<Option<Principal>, ServiceError> {
    let token = match token_from_request(req) {
        Some(token) => token,
        None => return Ok(None),
    };

    let claims = decode_token(config, &token)?;
    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| ServiceError::Unauthorized("Invalid user ID in token".to_string()))?;

    let user = repos
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(ServiceError::Unauthorized("User is inactive".to_string()));
    }

    Ok(Some(Principal::from(&user)))
}

pub async fn require_principal(
    req: &HttpRequest,
    config: &AppConfig,
    repos: &Repositories,
) -> Result<Principal, ServiceError> {
    resolve_principal(req, config, repos)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
}

pub async fn user_response(
    repos: &Repositories,
    config: &AppConfig,
    user: User,
) -> Result<UserResponse, ServiceError> {
    let avatar = match user.avatar_id {
        Some(id) => repos
            .users
            .find_avatar(id)
            .await?
            .map(|a| config.media_link(&a.image_path)),
        None => None,
    };
    Ok(UserResponse::new(user, avatar))
}

pub async fn register(repos: &Repositories, req: RegisterRequest) -> Result<User, ServiceError> {
    let req = RegisterRequest {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password: req.password,
    };
    req.validate()?;

    if repos.users.find_by_username(&req.username).await?.is_some() {
        return Err(ServiceError::ValidationError(
            "A user with that username already exists".to_string(),
        ));
    }

    let user = repos
        .users
        .create(NewUser {
            username: req.username,
            email: req.email,
            password_hash: hash_password(&req.password)?,
            is_staff: false,
        })
        .await?;

    log::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn login(
    repos: &Repositories,
    config: &AppConfig,
    req: LoginRequest,
) -> Result<LoginResponseData, ServiceError> {
    if req.username.trim().is_empty() {
        return Err(ServiceError::ValidationError("Username is required".to_string()));
    }
    if req.password.is_empty() {
        return Err(ServiceError::ValidationError("Password is required".to_string()));
    }

    let user = match repos.users.find_by_username(req.username.trim()).await? {
        Some(user) => user,
        None => {
            log::warn!("Login failed: User not found - {}", req.username);
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    if !verify(&req.password, &user.password_hash)? || !user.is_active {
        log::warn!("Login failed: Invalid credentials for user - {}", req.username);
        return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = issue_token(config, &user)?;
    let user = user_response(repos, config, user).await?;
    Ok(LoginResponseData { token, user })
}

pub async fn current_user(
    repos: &Repositories,
    principal: &Principal,
) -> Result<User, ServiceError> {
    repos
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))
}

pub async fn set_avatar(
    repos: &Repositories,
    storage: &dyn ImageStorage,
    config: &AppConfig,
    principal: &Principal,
    image: Option<UploadedImage>,
) -> Result<AvatarImage, ServiceError> {
    let image = image
        .ok_or_else(|| ServiceError::ValidationError("No image file was submitted".to_string()))?;
    let extension = image.validate(config.max_upload_bytes)?;
    let previous = match current_user(repos, principal).await?.avatar_id {
        Some(id) => repos.users.find_avatar(id).await?,
        None => None,
    };

    let path = storage.store(AVATAR_KIND, &extension, &image.data).await?;
    let avatar = match repos.users.set_avatar(principal.id, &path).await {
        Ok(avatar) => avatar,
        Err(e) => {
            if let Err(cleanup) = storage.remove(&path).await {
                log::warn!("Failed to clean up avatar {}: {}", path, cleanup);
            }
            return Err(e);
        }
    };

    // Best effort: the new avatar is already committed
    if let Some(old) = previous {
        if let Err(e) = repos.users.delete_avatar(old.id).await {
            log::warn!("Failed to delete avatar row {}: {}", old.id, e);
        }
        if let Err(e) = storage.remove(&old.image_path).await {
            log::warn!("Failed to remove avatar file {}: {}", old.image_path, e);
        }
    }

    log::info!("User {} set avatar {}", principal.id, avatar.id);
    Ok(avatar)
}
