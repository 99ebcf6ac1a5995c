use std::{collections::HashMap, path::Path};

use crate::{
    authentication::permissions::ActionType,
    error::{ErrorKind, QueryError},
    filters::RecipeFilter,
    form::RecipeForm,
    jwt::SessionData,
    media::{delete_image, save_image},
    pagination::PageQuery,
    schema::{Id, Recipe, RecipePart, RecipeRow, Tag},
};

use super::{
    ensure_ingredients_exist, ensure_tag_slugs_exist, ensure_tags_exist, list_recipe_tags,
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

/// Recipe with everything its read representation needs.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub row: RecipeRow,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipePart>,
}

/// Base SELECT over recipes joined with their authors; flags are computed
/// for `viewer` and are all false for anonymous callers.
fn recipe_query(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.pub_date,
            r.author_id,
            u.email AS author_email,
            u.username AS author_username,
            u.first_name AS author_first_name,
            u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM follows f WHERE f.author_id = r.author_id AND f.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS author_is_subscribed,
            EXISTS (SELECT 1 FROM favorite_recipes fr WHERE fr.recipe_id = r.id AND fr.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS is_favorited,
            EXISTS (SELECT 1 FROM shopping_lists sl WHERE sl.recipe_id = r.id AND sl.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
    );

    builder
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    query: &PageQuery,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipeDetail>, i64), crate::Error> {
    ensure_tag_slugs_exist(&filter.tags, pool).await?;

    let mut builder = recipe_query(viewer);

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id
                  WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    // the boolean filters are no-ops for anonymous callers
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorite_recipes fv WHERE fv.recipe_id = r.id AND fv.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            builder
                .push(" AND EXISTS (SELECT 1 FROM shopping_lists sv WHERE sv.recipe_id = r.id AND sv.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let details = load_details(rows, pool).await?;

    Ok((details, total_count))
}

pub async fn get_recipe_detail(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeDetail>, crate::Error> {
    let mut builder = recipe_query(viewer);
    builder.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(load_details(vec![row], pool).await?.pop()),
        None => Ok(None),
    }
}

async fn load_details(
    rows: Vec<RecipeRow>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, crate::Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_recipe_tags(&ids, pool).await?;
    let mut parts = list_recipe_parts(&ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| RecipeDetail {
            tags: tags.remove(&row.id).unwrap_or_default(),
            ingredients: parts.remove(&row.id).unwrap_or_default(),
            row,
        })
        .collect())
}

/// Ingredient amounts of every recipe in `recipe_ids`, keyed by recipe.
pub async fn list_recipe_parts(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipePart>>, crate::Error> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ia.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ia.amount
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ia.recipe_id = ANY($1)
        ORDER BY ia.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<RecipePart>> = HashMap::new();
    rows.into_iter()
        .for_each(|part| hashmap.entry(part.recipe_id).or_default().push(part));

    Ok(hashmap)
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, crate::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads a recipe the session may modify: its author, or an admin.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, crate::Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

/// Id of the author's recipe called `name`, if any.
pub async fn find_recipe(
    author_id: Id,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Id>, crate::Error> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT id FROM recipes WHERE author_id = $1 AND name = $2")
            .bind(author_id)
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}

async fn validate_references(form: &RecipeForm, pool: &Pool<Postgres>) -> Result<(), crate::Error> {
    let ingredient_ids: Vec<Id> = form.ingredients.iter().map(|i| i.id).collect();
    ensure_ingredients_exist(&ingredient_ids, pool).await?;
    ensure_tags_exist(&form.tags, pool).await?;
    Ok(())
}

/// Writes the recipe's tag and ingredient associations.
async fn attach_parts(
    recipe_id: Id,
    form: &RecipeForm,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), crate::Error> {
    if !form.ingredients.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ",
        );
        query_builder.push_values(form.ingredients.iter(), |mut b, part| {
            b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
        });
        query_builder
            .build()
            .execute(&mut **tr)
            .await
            .map_err(QueryError::from)?;
    }

    if !form.tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query_builder.push_values(form.tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query_builder
            .build()
            .execute(&mut **tr)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

async fn insert_recipe(
    author_id: Id,
    form: &RecipeForm,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, crate::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(image)
    .bind(form.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    attach_parts(id.0, form, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(id.0)
}

pub async fn create_recipe(
    author_id: Id,
    form: &RecipeForm,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<Id, crate::Error> {
    if find_recipe(author_id, &form.name, pool).await?.is_some() {
        return Err(ErrorKind::InvalidRequest.field(
            "name",
            "You already have a recipe with this name.",
        ));
    }
    validate_references(form, pool).await?;

    let image = match &form.image {
        Some(data) => save_image(data, media_root).await?,
        None => return Err(ErrorKind::InvalidRequest.field("image", "This field is required.")),
    };

    match insert_recipe(author_id, form, &image, pool).await {
        Ok(id) => {
            log::info!("Created recipe {id} for user {author_id}");
            Ok(id)
        }
        Err(e) => {
            delete_image(&image, media_root).await;
            Err(e)
        }
    }
}

async fn replace_recipe(
    recipe: &Recipe,
    form: &RecipeForm,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $2, text = $3, cooking_time = $4, image = COALESCE($5, image)
        WHERE id = $1
    ",
    )
    .bind(recipe.id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(image)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    attach_parts(recipe.id, form, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(())
}

/// Replaces the recipe's fields, tags and ingredients with `form`.
/// ATTENTION: DOES NOT CHECK FOR OWNERSHIP BY ITSELF, see `get_recipe_mut`
pub async fn update_recipe(
    recipe: &Recipe,
    form: &RecipeForm,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    if let Some(existing) = find_recipe(recipe.author_id, &form.name, pool).await? {
        if existing != recipe.id {
            return Err(ErrorKind::InvalidRequest.field(
                "name",
                "You already have a recipe with this name.",
            ));
        }
    }
    validate_references(form, pool).await?;

    let image = match &form.image {
        Some(data) => Some(save_image(data, media_root).await?),
        None => None,
    };

    match replace_recipe(recipe, form, image.as_deref(), pool).await {
        Ok(()) => {
            if image.is_some() {
                delete_image(&recipe.image, media_root).await;
            }
            log::info!("Updated recipe {}", recipe.id);
            Ok(())
        }
        Err(e) => {
            if let Some(image) = &image {
                delete_image(image, media_root).await;
            }
            Err(e)
        }
    }
}

/// Deletes the recipe; join rows go with it through the foreign keys.
/// ATTENTION: DOES NOT CHECK FOR OWNERSHIP BY ITSELF, see `get_recipe_mut`
pub async fn delete_recipe(
    recipe: &Recipe,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), crate::Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    delete_image(&recipe.image, media_root).await;
    log::info!("Deleted recipe {}", recipe.id);

    Ok(())
}
