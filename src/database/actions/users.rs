use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    config::Config,
    error::{ErrorKind, QueryError},
    form::{SetPasswordForm, UserCreateForm, UserUpdateForm},
    pagination::PageQuery,
    schema::{Id, User, UserRow},
};

use sqlx::{Pool, Postgres};

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, crate::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Option<User>, crate::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Single user as seen by `viewer` (anonymous when `None`).
pub async fn get_user_row(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserRow>, crate::Error> {
    let row: Option<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $2 AND f.author_id = u.id) AS is_subscribed,
            1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn fetch_users(
    viewer: Option<Id>,
    query: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<UserRow>, i64), crate::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(query.limit)
    .bind(query.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

/// Creates a user with the hashed version of their password.
pub async fn register_user(
    form: &UserCreateForm,
    pool: &Pool<Postgres>,
) -> Result<User, crate::Error> {
    let password = hash_password(&form.password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", user.username, user.id);

    Ok(user)
}

pub async fn update_user(
    user_id: Id,
    form: &UserUpdateForm,
    pool: &Pool<Postgres>,
) -> Result<User, crate::Error> {
    let user: Option<User> = sqlx::query_as(
        "
        UPDATE users
        SET email = COALESCE($2, email),
            username = COALESCE($3, username),
            first_name = COALESCE($4, first_name),
            last_name = COALESCE($5, last_name)
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(user_id)
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    user.ok_or_else(|| ErrorKind::NotFound.default())
}

pub async fn set_password(
    user_id: Id,
    form: &SetPasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    if !verify_password(&form.current_password, &user.password)? {
        return Err(ErrorKind::InvalidRequest.field("current_password", "Invalid password."));
    }

    let password = hash_password(&form.new_password)?;
    sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn login_user(
    email: &str,
    password: &str,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<String, crate::Error> {
    let invalid = || ErrorKind::InvalidRequest.new("Unable to log in with provided credentials.");

    let user = get_user(pool, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    generate_jwt_session(&user, &config.secret_key, config.token_lifetime_hours)
}
