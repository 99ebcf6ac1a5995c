use std::collections::HashMap;

use crate::{
    error::{ErrorKind, QueryError},
    form::TagForm,
    schema::{Id, LinkedTag, Tag},
};

use sqlx::{Pool, Postgres};

pub async fn create_tag(form: &TagForm, pool: &Pool<Postgres>) -> Result<Tag, crate::Error> {
    let tag: Tag =
        sqlx::query_as("INSERT INTO tags (name, slug, color) VALUES ($1, $2, $3) RETURNING *")
            .bind(&form.name)
            .bind(&form.slug)
            .bind(&form.color)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    log::info!("Created tag {} ({})", tag.slug, tag.id);
    Ok(tag)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, crate::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, crate::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Tags of every recipe in `recipe_ids`, keyed by recipe.
pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Tag>>, crate::Error> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let list: Vec<LinkedTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<Tag>> = HashMap::new();
    list.into_iter().for_each(|tag| {
        hashmap.entry(tag.recipe_id).or_default().push(tag.into());
    });

    Ok(hashmap)
}

/// Fails on the first id that names no tag.
pub async fn ensure_tags_exist(ids: &[Id], pool: &Pool<Postgres>) -> Result<(), crate::Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    match ids.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
        Some(missing) => Err(ErrorKind::InvalidRequest.field(
            "tags",
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        )),
        None => Ok(()),
    }
}

/// Fails on the first slug that names no tag.
pub async fn ensure_tag_slugs_exist(
    slugs: &[String],
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    if slugs.is_empty() {
        return Ok(());
    }

    let found: Vec<(String,)> = sqlx::query_as("SELECT slug FROM tags WHERE slug = ANY($1)")
        .bind(slugs)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    match slugs.iter().find(|slug| !found.iter().any(|(f,)| f == *slug)) {
        Some(missing) => Err(ErrorKind::InvalidRequest.field(
            "tags",
            &format!("Select a valid choice. {missing} is not one of the available choices."),
        )),
        None => Ok(()),
    }
}
