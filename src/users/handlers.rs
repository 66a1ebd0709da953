use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use tracing::{error, info, instrument, warn};

use super::dto::{CreateUserRequest, CreatedUserResponse, MessageResponse, UpdateUserRequest};
use super::password::hash_password;
use super::repo::{User, UserChanges};
use crate::error::{ApiError, AppJson};
use crate::state::AppState;

const DOB_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

// --- public routers ---

pub fn collection_routes() -> Router<AppState> {
    Router::new().route(
        "/users",
        get(list_users)
            .post(create_user)
            .put(id_required)
            .delete(id_required)
            .options(preflight)
            .fallback(method_not_allowed),
    )
}

pub fn item_routes() -> Router<AppState> {
    Router::new().route(
        "/users/:id",
        get(get_user)
            .put(update_user)
            .delete(delete_user)
            .options(preflight)
            .fallback(method_not_allowed),
    )
}

// --- helpers ---

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("User ID required".into()))
}

fn parse_dob(raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw, DOB_FORMAT)
        .map_err(|_| ApiError::BadRequest("Invalid date of birth".into()))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn id_required() -> ApiError {
    ApiError::BadRequest("User ID required".into())
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(format!("Method not allowed: {}", method))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    match User::find_by_id(&state.db, id).await? {
        Some(user) => Ok(Json(user)),
        None => {
            warn!(%id, "user not found");
            Err(ApiError::NotFound("User not found".into()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), ApiError> {
    let (Some(name), Some(email), Some(password), Some(dob)) =
        (payload.name, payload.email, payload.password, payload.dob)
    else {
        warn!("create user missing required fields");
        return Err(ApiError::BadRequest("Missing required fields".into()));
    };

    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    let dob = parse_dob(&dob)?;

    let hash = hash_password(&password)?;
    let id = User::create(&state.db, &name, &email, &hash, dob)
        .await
        .map_err(|e| {
            error!(error = %e, "insert user failed");
            ApiError::BadRequest(e.to_string())
        })?;

    info!(%id, email = %email, "user created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse { message: "User created", id }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !payload.has_changes() {
        warn!(%id, "update with no fields");
        return Err(ApiError::BadRequest("No fields to update".into()));
    }

    let email = match payload.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                warn!(email = %email, "invalid email");
                return Err(ApiError::BadRequest("Invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };

    let changes = UserChanges {
        name: payload.name,
        email,
        password_hash: payload.password.as_deref().map(hash_password).transpose()?,
        dob: payload.dob.as_deref().map(parse_dob).transpose()?,
    };

    let rows = User::update(&state.db, id, &changes).await.map_err(|e| {
        error!(error = %e, %id, "update user failed");
        ApiError::BadRequest(e.to_string())
    })?;
    if rows == 0 {
        warn!(%id, "update matched no rows");
    }

    info!(%id, "user updated");
    Ok(Json(MessageResponse { message: "User updated" }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    let rows = User::delete(&state.db, id).await.map_err(|e| {
        error!(error = %e, %id, "delete user failed");
        ApiError::BadRequest(e.to_string())
    })?;
    if rows == 0 {
        warn!(%id, "delete matched no rows");
    }

    info!(%id, "user deleted");
    Ok(Json(MessageResponse { message: "User deleted" }))
}
