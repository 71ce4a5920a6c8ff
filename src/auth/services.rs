use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use super::{
    dto::RegisterRequest,
    jwt::{JwtKeys, TokenError},
    password::{hash_password, verify_password},
    repo_types::User,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn issue_token(st: &AppState, user: &User) -> AppResult<String> {
    JwtKeys::from_ref(st).sign(user.id).map_err(|e| {
        error!(error = %e, user_id = %user.id, "jwt sign failed");
        AppError::internal("could not issue session token")
    })
}

fn hash(plain: &str) -> AppResult<String> {
    hash_password(plain).map_err(|e| AppError::internal(e.to_string()))
}

/// Creates a user and issues its first session token.
pub async fn register(st: &AppState, req: RegisterRequest) -> AppResult<(User, String)> {
    let name = req.name.trim();
    let email = req.email.trim();

    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    if st.users.find_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = hash(&req.password)?;
    // A concurrent registration that slipped past the lookup hits the unique
    // constraint and surfaces as Conflict here.
    let user = st.users.insert(name, email, &password_hash).await?;
    let token = issue_token(st, &user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, token))
}

pub async fn login(st: &AppState, email: &str, password: &str) -> AppResult<(User, String)> {
    let email = email.trim();
    let invalid = || AppError::unauthorized("Invalid credentials");

    let Some(user) = st.users.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };

    let ok = verify_password(password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "stored password hash unreadable");
        AppError::internal("could not verify credentials")
    })?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let token = issue_token(st, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

pub async fn change_password(
    st: &AppState,
    actor: &User,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    if new_password.is_empty() {
        return Err(AppError::validation("New password is required"));
    }
    let ok = verify_password(current_password, &actor.password_hash)
        .map_err(|e| AppError::internal(e.to_string()))?;
    if !ok {
        warn!(user_id = %actor.id, "change password with wrong current password");
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash(new_password)?;
    st.users.update_password_hash(actor.id, &password_hash).await?;
    info!(user_id = %actor.id, "password changed");
    Ok(())
}

/// Resolves a bearer token to its user.
pub async fn validate(st: &AppState, token: &str) -> AppResult<User> {
    let claims = JwtKeys::from_ref(st).verify(token).map_err(|e| {
        match &e {
            TokenError::Expired => warn!("expired token"),
            TokenError::Invalid(reason) => warn!(%reason, "invalid token"),
        }
        AppError::unauthorized(match e {
            TokenError::Expired => "Token has expired",
            TokenError::Invalid(_) => "Invalid token",
        })
    })?;

    st.users.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "token subject no longer exists");
        AppError::not_found("User not found")
    })
}

/// Always succeeds so callers cannot probe which emails are registered.
/// No mail is sent.
pub async fn forgot_password(st: &AppState, email: &str) -> AppResult<()> {
    match st.users.find_by_email(email.trim()).await {
        Ok(Some(user)) => info!(user_id = %user.id, "password reset requested"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "password reset lookup failed"),
    }
    Ok(())
}
