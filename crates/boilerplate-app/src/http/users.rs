use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use boilerplate_core::{CoreError, NewUser, UserRepository};

use super::dto::{CountResponse, CreateUserRequest, UserDto};
use super::AppState;
use crate::error::{AppError, AppResult};

pub(super) async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserDto>>> {
    let users = state
        .with_database(|database| database.list_users())
        .await?;
    let users = users
        .into_iter()
        .map(UserDto::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(users))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Response> {
    let id = parse_user_id(&raw_id)?;
    let user = state
        .with_database(move |database| database.find_user_by_id(id))
        .await?;

    match user {
        Some(user) => Ok(Json(UserDto::try_from(user)?).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<UserDto>)> {
    let new_user = NewUser::new(&request.username, &request.email)?;

    let created = state
        .with_database(move |database| {
            if database.username_exists(new_user.username())? {
                return Err(CoreError::Conflict("Username already exists".to_owned()));
            }
            if database.email_exists(new_user.email())? {
                return Err(CoreError::Conflict("Email already exists".to_owned()));
            }
            database.create_user(&new_user)
        })
        .await?;

    tracing::info!(user = %created, "user created");
    let location = format!("/api/users/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserDto::try_from(created)?),
    ))
}

pub(super) async fn count_users(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let count = state
        .with_database(|database| database.count_users())
        .await?;
    Ok(Json(CountResponse::new(count)))
}

// `/api/users/{id}.json` lands here with the suffix still attached.
fn parse_user_id(raw: &str) -> AppResult<i64> {
    let trimmed = raw.strip_suffix(".json").unwrap_or(raw);
    trimmed
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("Invalid user id '{raw}'")))
}
