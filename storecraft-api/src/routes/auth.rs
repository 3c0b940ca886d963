//! Authentication endpoints
//!
//! - `POST /v1/auth/register`: create an account together with its first store
//! - `POST /v1/auth/login`: exchange credentials for tokens
//! - `POST /v1/auth/refresh`: exchange a refresh token for a new access token
//! - `POST /v1/auth/logout`: clear the session cookie
//! - `GET  /v1/auth/me`: the signed-in user, store and role
//!
//! Token responses also set the `access_token` HttpOnly cookie, so browser
//! dashboards never have to store the token themselves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use storecraft_shared::{
    auth::{
        jwt::{self, Claims, TokenType},
        middleware::{AuthContext, ACCESS_TOKEN_COOKIE},
        password,
    },
    commerce::host::{slugify, validate_subdomain},
    models::{
        membership::{CreateMembership, Membership, MembershipRole},
        tenant::{CreateTenant, Tenant, TenantPlan},
        user::{CreateUser, User},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength rules are checked separately
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Store name must be 1-100 characters"))]
    pub store_name: String,

    /// Lowercase letters, digits and hyphens; derived from the store name when absent
    pub subdomain: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    /// Store to sign in to; defaults to the user's first store
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: MembershipRole,
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct StoreMembership {
    pub tenant_id: Uuid,
    pub role: MembershipRole,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub tenant: Tenant,
    pub role: MembershipRole,
    pub stores: Vec<StoreMembership>,
}

/// `Set-Cookie` value carrying the access token
pub fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_header(
    token: &str,
    max_age: i64,
    secure: bool,
) -> ApiResult<AppendHeaders<[(header::HeaderName, HeaderValue); 1]>> {
    let value = HeaderValue::from_str(&session_cookie(token, max_age, secure))
        .map_err(|e| ApiError::InternalError(format!("Invalid cookie value: {}", e)))?;
    Ok(AppendHeaders([(header::SET_COOKIE, value)]))
}

fn issue_tokens(
    state: &AppState,
    user_id: Uuid,
    tenant_id: Uuid,
    role: MembershipRole,
    with_refresh: bool,
) -> ApiResult<TokenResponse> {
    let access = Claims::new(user_id, tenant_id, role, TokenType::Access);
    let access_token = jwt::create_token(&access, state.jwt_secret())?;

    let refresh_token = if with_refresh {
        let refresh = Claims::new(user_id, tenant_id, role, TokenType::Refresh);
        Some(jwt::create_token(&refresh, state.jwt_secret())?)
    } else {
        None
    };

    Ok(TokenResponse {
        user_id,
        tenant_id,
        role,
        access_token,
        refresh_token,
        expires_in: access.expires_in_seconds(),
    })
}

fn token_reply(state: &AppState, status: StatusCode, tokens: TokenResponse) -> ApiResult<impl IntoResponse> {
    let cookie = cookie_header(
        &tokens.access_token,
        tokens.expires_in,
        state.config.api.production,
    )?;
    Ok((status, cookie, Json(tokens)))
}

/// Register a user and their store
///
/// User, store and owner membership are created in one transaction.
///
/// # Errors
///
/// - `422`: invalid email, weak password, bad subdomain
/// - `409`: email or subdomain already taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid("password", e))?;

    let subdomain = req
        .subdomain
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_else(|| slugify(&req.store_name));
    validate_subdomain(&subdomain).map_err(|e| ApiError::invalid("subdomain", e))?;
    if Tenant::subdomain_exists(&state.db, &subdomain).await? {
        return Err(ApiError::Conflict("Subdomain already taken".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
        },
    )
    .await?;

    let tenant = Tenant::create(
        &mut *tx,
        CreateTenant {
            name: req.store_name.trim().to_string(),
            subdomain,
            plan: TenantPlan::Trial,
            currency: "USD".to_string(),
        },
    )
    .await?;

    Membership::create(
        &mut *tx,
        CreateMembership {
            tenant_id: tenant.id,
            user_id: user.id,
            role: MembershipRole::Owner,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        tenant_id = %tenant.id,
        subdomain = %tenant.subdomain,
        "Registered store owner"
    );

    let tokens = issue_tokens(&state, user.id, tenant.id, MembershipRole::Owner, true)?;
    token_reply(&state, StatusCode::CREATED, tokens)
}

/// Sign in to one of the user's stores
///
/// # Errors
///
/// - `401`: unknown email or wrong password (indistinguishable)
/// - `403`: `tenant_id` given but the user is not a member
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    let memberships = Membership::list_by_user(&state.db, user.id).await?;
    let membership = match req.tenant_id {
        Some(tenant_id) => memberships
            .into_iter()
            .find(|m| m.tenant_id == tenant_id)
            .ok_or_else(|| ApiError::Forbidden("Not a member of this store".to_string()))?,
        None => memberships
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Forbidden("Account has no store".to_string()))?,
    };

    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, tenant_id = %membership.tenant_id, "User logged in");

    let tokens = issue_tokens(&state, user.id, membership.tenant_id, membership.role, true)?;
    token_reply(&state, StatusCode::OK, tokens)
}

/// Mint a new access token
///
/// The role is read again from the database, so role changes take effect on
/// the next refresh and removed members cannot refresh at all.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let role = Membership::get_role(&state.db, claims.tenant_id, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Membership no longer exists".to_string()))?;

    let tokens = issue_tokens(&state, claims.sub, claims.tenant_id, role, false)?;
    token_reply(&state, StatusCode::OK, tokens)
}

/// Clear the session cookie
pub async fn logout(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cookie = cookie_header("", 0, state.config.api.production)?;
    Ok((StatusCode::NO_CONTENT, cookie))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
    let tenant = Tenant::find_by_id(&state.db, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Store no longer exists".to_string()))?;

    let memberships = Membership::list_by_user(&state.db, user.id).await?;
    let role = memberships
        .iter()
        .find(|m| m.tenant_id == tenant.id)
        .map(|m| m.role)
        .ok_or_else(|| ApiError::Forbidden("Not a member of this store".to_string()))?;

    Ok(Json(MeResponse {
        user,
        tenant,
        role,
        stores: memberships
            .into_iter()
            .map(|m| StoreMembership {
                tenant_id: m.tenant_id,
                role: m.role,
            })
            .collect(),
    }))
}
