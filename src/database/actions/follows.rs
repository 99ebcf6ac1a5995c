use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::{ErrorKind, QueryError},
    pagination::PageQuery,
    schema::{Id, RecipeShortRow, SubscriptionRow},
};

const SUBSCRIPTION_COLUMNS: &str = "
    u.id, u.email, u.username, u.first_name, u.last_name,
    (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count";

pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), crate::Error> {
    if user_id == author_id {
        return Err(ErrorKind::InvalidRequest.new("You cannot subscribe to yourself."));
    }

    let query = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new("You are already subscribed to this user."));
    }

    log::trace!("> User {user_id} subscribed to {author_id}");
    Ok(())
}

pub async fn unsubscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    if user_id == author_id {
        return Err(ErrorKind::InvalidRequest.new("You cannot unsubscribe from yourself."));
    }

    let query = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new("You are not subscribed to this user."));
    }

    log::trace!("> User {user_id} unsubscribed from {author_id}");
    Ok(())
}

pub async fn get_subscription(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<SubscriptionRow>, crate::Error> {
    let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
        "
        SELECT {SUBSCRIPTION_COLUMNS}, 1::BIGINT AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1 AND f.author_id = $2
    "
    ))
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn fetch_subscriptions(
    user_id: Id,
    query: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<SubscriptionRow>, i64), crate::Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
        "
        SELECT {SUBSCRIPTION_COLUMNS}, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY f.id
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(user_id)
    .bind(query.limit)
    .bind(query.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

/// Newest recipes of each author, at most `limit` per author.
pub async fn list_author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeShortRow>>, crate::Error> {
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<RecipeShortRow> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, cooking_time
        FROM (
            SELECT r.id, r.author_id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, position
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<RecipeShortRow>> = HashMap::new();
    rows.into_iter()
        .for_each(|row| hashmap.entry(row.author_id).or_default().push(row));

    Ok(hashmap)
}
