use crate::{
    error::{ErrorKind, QueryError},
    form::IngredientForm,
    schema::{Id, Ingredient},
};

use sqlx::{Pool, Postgres};

pub async fn create_ingredient(
    form: &IngredientForm,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, crate::Error> {
    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(&form.name)
    .bind(&form.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Created ingredient {} ({})", ingredient.name, ingredient.id);
    Ok(ingredient)
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, crate::Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Ingredients ordered by name, optionally restricted to a case-sensitive
/// name prefix.
pub async fn list_ingredients(
    prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, crate::Error> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT * FROM ingredients
        WHERE $1::TEXT IS NULL OR starts_with(name, $1)
        ORDER BY name, id
    ",
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Fails on the first id that names no ingredient.
pub async fn ensure_ingredients_exist(
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    match ids.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
        Some(missing) => Err(ErrorKind::InvalidRequest.field(
            "ingredients",
            &format!("Ingredient {missing} does not exist."),
        )),
        None => Ok(()),
    }
}
