use sqlx::{Pool, Postgres};

use crate::{
    error::{ErrorKind, QueryError},
    schema::{Id, RecipeShortRow},
};

/// Per-user bookmark tables over recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    fn table(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorite_recipes",
            RecipeRelation::ShoppingCart => "shopping_lists",
        }
    }

    fn already_exists(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    fn missing(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

/// Fails with a client error when the pair already exists.
pub async fn add_recipe_relation(
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    let query = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new(relation.already_exists()));
    }

    log::trace!("> {relation:?} added: user {user_id}, recipe {recipe_id}");
    Ok(())
}

/// Fails with a client error when the pair does not exist.
pub async fn remove_recipe_relation(
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    let query = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ErrorKind::InvalidRequest.new(relation.missing()));
    }

    log::trace!("> {relation:?} removed: user {user_id}, recipe {recipe_id}");
    Ok(())
}

pub async fn get_recipe_short(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeShortRow>, crate::Error> {
    let row: Option<RecipeShortRow> = sqlx::query_as(
        "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}
