use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{expires_at, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, ErrorBody},
    model::user::User,
    models::{LoginReqDto, RefreshReqDto, TokenPair, TokenType},
    store::Store,
};

/// Signs a fresh access/refresh pair and records the refresh token.
async fn issue_tokens(store: &dyn Store, config: &Config, user: &User) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(user, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            AppError::internal()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(user, &config.jwt_secret, config.refresh_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            AppError::internal()
        })?;

    debug!(jti = %refresh_claims.jti, "Storing refresh token");
    store
        .store_refresh_token(&user.username, &refresh_claims.jti, expires_at(&refresh_claims))
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: config.access_token_ttl,
    })
}

/// Log in
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Tokens issued", body = TokenPair),
        (status = 400, description = "Missing username or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, body),
    fields(login = %body.login)
)]
pub async fn login(
    body: web::Json<LoginReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<impl Responder, AppError> {
    info!("Login request received");

    if body.login.trim().is_empty() || body.password.is_empty() {
        info!("Validation failed: empty login or password");
        return Err(AppError::Validation("Username and password are required".to_string()));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let credentials = match store.find_credentials(body.login.trim()).await? {
        Some(c) => c,
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid());
        }
    };

    if let Err(e) = verify_password(&body.password, &credentials.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    if !credentials.user.active {
        info!("Login refused: account inactive");
        return Err(invalid());
    }

    let tokens = issue_tokens(store.get_ref(), &config, &credentials.user).await?;

    if let Err(e) = store.record_login(&credentials.user.username).await {
        // login still succeeds
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(username = %credentials.user.username, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshReqDto,
    responses(
        (status = 200, description = "New token pair; the old refresh token is revoked", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or already used", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    body: web::Json<RefreshReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<impl Responder, AppError> {
    let rejected = || AppError::Unauthorized("Invalid refresh token".to_string());

    let claims = verify_token(&body.refresh_token, &config.jwt_secret).map_err(|e| {
        debug!(error = %e, "Refresh token failed verification");
        rejected()
    })?;

    if claims.token_type != TokenType::Refresh {
        return Err(rejected());
    }

    if !store.revoke_refresh_token(&claims.jti).await? {
        warn!(username = %claims.sub, jti = %claims.jti, "Refresh token reuse or unknown token");
        return Err(rejected());
    }

    let user = match store.get_user(&claims.sub).await? {
        Some(user) if user.active => user,
        _ => return Err(rejected()),
    };

    let tokens = issue_tokens(store.get_ref(), &config, &user).await?;
    info!(username = %user.username, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Log out
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshReqDto,
    responses(
        (status = 204, description = "Refresh token revoked (also when it was unknown)")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_logout", skip_all)]
pub async fn logout(
    body: web::Json<RefreshReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> impl Responder {
    if let Ok(claims) = verify_token(&body.refresh_token, &config.jwt_secret) {
        if claims.token_type == TokenType::Refresh {
            match store.revoke_refresh_token(&claims.jti).await {
                Ok(revoked) => debug!(username = %claims.sub, revoked, "Logout"),
                Err(e) => warn!(error = %e, "Failed to revoke refresh token on logout"),
            }
        }
    }

    HttpResponse::NoContent().finish()
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the caller", body = User),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, store: web::Data<dyn Store>) -> Result<impl Responder, AppError> {
    let user = store
        .get_user(&auth.username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {}", auth.username)))?;
    Ok(HttpResponse::Ok().json(user))
}
