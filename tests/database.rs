//! Storage-level tests. They run against the database named by
//! `TEST_DATABASE_URL` and are skipped when it is unset.

use std::path::Path;

use foodgram::{
    actions::*,
    config::Config,
    filters::RecipeFilter,
    form::{
        Form, IngredientAmountForm, IngredientForm, RecipeForm, SetPasswordForm, TagForm,
        UserCreateForm,
    },
    jwt::verify_jwt_session,
    pagination::PageQuery,
    schema::{Id, Ingredient, ShoppingListItem, Tag, User},
    Error, ErrorKind,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tempfile::TempDir;
use uuid::Uuid;

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

async fn setup() -> Option<(Pool<Postgres>, TempDir)> {
    let _ = env_logger::builder().is_test(true).try_init();

    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            log::warn!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    Some((pool, tempfile::tempdir().unwrap()))
}

fn unique() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

async fn user(pool: &Pool<Postgres>) -> User {
    let tag = unique();
    register_user(
        &UserCreateForm {
            email: format!("{tag}@example.com"),
            username: format!("cook_{tag}"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::from("secret"),
        },
        pool,
    )
    .await
    .unwrap()
}

async fn ingredient(name: &str, unit: &str, pool: &Pool<Postgres>) -> Ingredient {
    create_ingredient(
        &IngredientForm {
            name: format!("{name} {}", unique()),
            measurement_unit: unit.to_string(),
        },
        pool,
    )
    .await
    .unwrap()
}

async fn tag(pool: &Pool<Postgres>) -> Tag {
    let slug = format!("tag-{}", unique());
    create_tag(
        &TagForm {
            name: slug.clone(),
            slug,
            color: String::from("#e26c2d"),
        },
        pool,
    )
    .await
    .unwrap()
}

fn recipe_form(name: &str, ingredients: &[(Id, i32)], tags: &[Id]) -> RecipeForm {
    RecipeForm {
        name: name.to_string(),
        text: String::from("Mix and cook."),
        cooking_time: 10,
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientAmountForm {
                id: *id,
                amount: *amount,
            })
            .collect(),
        tags: tags.to_vec(),
        image: Some(PIXEL.to_string()),
    }
}

async fn recipe(
    author: &User,
    ingredients: &[(Id, i32)],
    tags: &[Id],
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Id {
    let name = format!("Recipe {}", unique());
    create_recipe(author.id, &recipe_form(&name, ingredients, tags), media_root, pool)
        .await
        .unwrap()
}

async fn is_linked(table: &str, user_id: Id, recipe_id: Id, pool: &Pool<Postgres>) -> bool {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE user_id = $1 AND recipe_id = $2)"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

async fn follows(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> bool {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)")
            .bind(user_id)
            .bind(author_id)
            .fetch_one(pool)
            .await
            .unwrap();
    row.0
}

#[tokio::test]
async fn favorites_reject_duplicates_and_missing_pairs() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let id = recipe(&cook, &[(flour.id, 100)], &[], media.path(), &pool).await;

    add_recipe_relation(RecipeRelation::Favorite, cook.id, id, &pool)
        .await
        .unwrap();
    let err = add_recipe_relation(RecipeRelation::Favorite, cook.id, id, &pool)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.info, "Recipe is already in favorites.");
    assert!(is_linked("favorite_recipes", cook.id, id, &pool).await);

    // the shopping cart is independent of favorites
    assert!(!is_linked("shopping_lists", cook.id, id, &pool).await);

    remove_recipe_relation(RecipeRelation::Favorite, cook.id, id, &pool)
        .await
        .unwrap();
    let err = remove_recipe_relation(RecipeRelation::Favorite, cook.id, id, &pool)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn subscriptions_reject_self_and_duplicates() {
    let Some((pool, media)) = setup().await else { return };

    let reader = user(&pool).await;
    let author = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    for _ in 0..3 {
        recipe(&author, &[(flour.id, 100)], &[], media.path(), &pool).await;
    }

    let err = subscribe(reader.id, reader.id, &pool).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);

    subscribe(reader.id, author.id, &pool).await.unwrap();
    let err = subscribe(reader.id, author.id, &pool).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert!(follows(reader.id, author.id, &pool).await);

    let subscription = get_subscription(reader.id, author.id, &pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.recipes_count, 3);

    let limited = list_author_recipes(&[author.id], Some(2), &pool).await.unwrap();
    assert_eq!(limited[&author.id].len(), 2);

    let (rows, total) = fetch_subscriptions(reader.id, &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, author.id);

    unsubscribe(reader.id, author.id, &pool).await.unwrap();
    let err = unsubscribe(reader.id, author.id, &pool).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn recipe_names_are_unique_per_author() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let other = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let form = recipe_form("Pancakes", &[(flour.id, 200)], &[]);

    create_recipe(cook.id, &form, media.path(), &pool).await.unwrap();
    let err = create_recipe(cook.id, &form, media.path(), &pool)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("name"));

    create_recipe(other.id, &form, media.path(), &pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_references_are_rejected() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let form = recipe_form("Mystery", &[(i32::MAX, 1)], &[]);

    let err = create_recipe(cook.id, &form, media.path(), &pool)
        .await
        .unwrap_err();
    assert_eq!(err.field.as_deref(), Some("ingredients"));
}

#[tokio::test]
async fn shopping_list_sums_amounts_across_recipes() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let milk = ingredient("Milk", "ml", &pool).await;

    let first = recipe(&cook, &[(flour.id, 200), (milk.id, 250)], &[], media.path(), &pool).await;
    let second = recipe(&cook, &[(flour.id, 500)], &[], media.path(), &pool).await;
    let skipped = recipe(&cook, &[(milk.id, 1000)], &[], media.path(), &pool).await;

    for id in [first, second] {
        add_recipe_relation(RecipeRelation::ShoppingCart, cook.id, id, &pool)
            .await
            .unwrap();
    }
    // favorites never reach the shopping list
    add_recipe_relation(RecipeRelation::Favorite, cook.id, skipped, &pool)
        .await
        .unwrap();

    let items = aggregate_shopping_list(cook.id, &pool).await.unwrap();
    assert_eq!(
        items,
        vec![
            ShoppingListItem {
                name: flour.name.clone(),
                measurement_unit: String::from("g"),
                total: 700,
            },
            ShoppingListItem {
                name: milk.name.clone(),
                measurement_unit: String::from("ml"),
                total: 250,
            },
        ]
    );

    let text = render_shopping_list(&items);
    assert!(text.contains(&format!("- {} (g): 700", flour.name)));
}

#[tokio::test]
async fn update_replaces_tags_and_ingredients() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let milk = ingredient("Milk", "ml", &pool).await;
    let eggs = ingredient("Eggs", "pcs", &pool).await;
    let breakfast = tag(&pool).await;
    let dinner = tag(&pool).await;

    let id = recipe(
        &cook,
        &[(flour.id, 200), (milk.id, 300)],
        &[breakfast.id],
        media.path(),
        &pool,
    )
    .await;
    let before = get_recipe(id, &pool).await.unwrap().unwrap();

    let mut form = recipe_form("Omelette", &[(eggs.id, 3)], &[dinner.id]);
    form.image = None;
    update_recipe(&before, &form, media.path(), &pool)
        .await
        .unwrap();

    let detail = get_recipe_detail(id, Some(cook.id), &pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.row.name, "Omelette");
    assert_eq!(detail.row.image, before.image);
    assert_eq!(detail.row.author_id, cook.id);
    assert_eq!(detail.tags, vec![dinner]);
    assert_eq!(detail.ingredients.len(), 1);
    assert_eq!(detail.ingredients[0].ingredient_id, eggs.id);
    assert_eq!(detail.ingredients[0].amount, 3);
}

#[tokio::test]
async fn deleting_a_recipe_cascades() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let breakfast = tag(&pool).await;
    let id = recipe(&cook, &[(flour.id, 100)], &[breakfast.id], media.path(), &pool).await;

    add_recipe_relation(RecipeRelation::Favorite, cook.id, id, &pool)
        .await
        .unwrap();
    add_recipe_relation(RecipeRelation::ShoppingCart, cook.id, id, &pool)
        .await
        .unwrap();

    let recipe = get_recipe(id, &pool).await.unwrap().unwrap();
    assert!(media.path().join(&recipe.image).exists());

    delete_recipe(&recipe, media.path(), &pool).await.unwrap();

    assert!(get_recipe(id, &pool).await.unwrap().is_none());
    assert!(list_recipe_parts(&[id], &pool).await.unwrap().is_empty());
    assert!(list_recipe_tags(&[id], &pool).await.unwrap().is_empty());
    assert!(!is_linked("favorite_recipes", cook.id, id, &pool).await);
    assert!(aggregate_shopping_list(cook.id, &pool).await.unwrap().is_empty());
    assert!(!media.path().join(&recipe.image).exists());

    // the tag and the ingredient outlive the recipe
    assert!(get_tag(breakfast.id, &pool).await.unwrap().is_some());
    assert!(get_ingredient(flour.id, &pool).await.unwrap().is_some());
}

#[tokio::test]
async fn recipe_listing_filters() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let viewer = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let lunch = tag(&pool).await;
    let dinner = tag(&pool).await;

    let older = recipe(&cook, &[(flour.id, 100)], &[lunch.id], media.path(), &pool).await;
    let newer = recipe(&cook, &[(flour.id, 100)], &[dinner.id], media.path(), &pool).await;
    add_recipe_relation(RecipeRelation::Favorite, viewer.id, newer, &pool)
        .await
        .unwrap();

    let by_author = RecipeFilter {
        author: Some(cook.id),
        ..Default::default()
    };
    let (details, total) = fetch_recipes(&by_author, Some(viewer.id), &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(details[0].row.id, newer);
    assert_eq!(details[1].row.id, older);
    assert!(details[0].row.is_favorited);
    assert!(!details[1].row.is_favorited);

    let any_tag = RecipeFilter {
        tags: vec![lunch.slug.clone(), dinner.slug.clone()],
        ..Default::default()
    };
    let (_, total) = fetch_recipes(&any_tag, None, &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(total, 2);

    let one_tag = RecipeFilter {
        tags: vec![lunch.slug.clone()],
        ..Default::default()
    };
    let (details, _) = fetch_recipes(&one_tag, None, &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].row.id, older);
    assert_eq!(details[0].tags, vec![lunch]);

    let favorited = RecipeFilter {
        author: Some(cook.id),
        is_favorited: true,
        ..Default::default()
    };
    let (details, _) = fetch_recipes(&favorited, Some(viewer.id), &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].row.id, newer);

    // ignored for anonymous callers
    let (details, _) = fetch_recipes(&favorited, None, &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(details.len(), 2);

    add_recipe_relation(RecipeRelation::ShoppingCart, viewer.id, older, &pool)
        .await
        .unwrap();
    let in_cart = RecipeFilter {
        author: Some(cook.id),
        is_in_shopping_cart: true,
        ..Default::default()
    };
    let (details, total) = fetch_recipes(&in_cart, Some(viewer.id), &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(details[0].row.id, older);
    assert!(details[0].row.is_in_shopping_cart);
    assert!(!details[0].row.is_favorited);

    let (details, _) = fetch_recipes(&in_cart, None, &PageQuery::default(), &pool)
        .await
        .unwrap();
    assert_eq!(details.len(), 2);
    assert!(details.iter().all(|detail| !detail.row.is_in_shopping_cart));
}

#[tokio::test]
async fn unknown_tag_slug_is_rejected() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let lunch = tag(&pool).await;
    recipe(&cook, &[(flour.id, 100)], &[lunch.id], media.path(), &pool).await;

    let missing = format!("missing-{}", unique());
    let filter = RecipeFilter {
        tags: vec![lunch.slug.clone(), missing.clone()],
        ..Default::default()
    };
    let err = fetch_recipes(&filter, None, &PageQuery::default(), &pool)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("tags"));
    assert!(err.info.contains(&missing));
}

#[tokio::test]
async fn ingredient_prefix_is_case_sensitive() {
    let Some((pool, _media)) = setup().await else { return };

    let prefix = format!("Sa{}", unique());
    let salt = create_ingredient(
        &IngredientForm {
            name: format!("{prefix}lt"),
            measurement_unit: String::from("g"),
        },
        &pool,
    )
    .await
    .unwrap();

    let found = list_ingredients(Some(&prefix), &pool).await.unwrap();
    assert_eq!(found, vec![salt]);

    let found = list_ingredients(Some(&prefix.to_lowercase()), &pool).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn storage_checks_map_to_fields() {
    let Some((pool, media)) = setup().await else { return };

    let cook = user(&pool).await;
    let flour = ingredient("Flour", "g", &pool).await;
    let sugar = ingredient("Sugar", "g", &pool).await;
    let id = recipe(&cook, &[(flour.id, 100)], &[], media.path(), &pool).await;

    let err = sqlx::query("UPDATE recipes SET cooking_time = 0 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(Error::from)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("cooking_time"));
    assert_eq!(err.info, "Cooking time must be at least 1 minute.");

    let err = sqlx::query(
        "INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) VALUES ($1, $2, 0)",
    )
    .bind(id)
    .bind(sugar.id)
    .execute(&pool)
    .await
    .map_err(Error::from)
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("ingredients"));
    assert_eq!(err.info, "Ingredient amount must be at least 1.");
}

#[tokio::test]
async fn duplicate_registration_names_the_field() {
    let Some((pool, _media)) = setup().await else { return };

    let existing = user(&pool).await;
    let err = register_user(
        &UserCreateForm {
            email: existing.email.clone(),
            username: format!("other_{}", unique()),
            first_name: String::from("Grace"),
            last_name: String::from("Hopper"),
            password: String::from("secret"),
        },
        &pool,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("email"));
}

#[tokio::test]
async fn emails_are_unique_regardless_of_case() {
    let Some((pool, _media)) = setup().await else { return };

    let config = Config::from_lookup(|key| match key {
        "SECRET_KEY" => Some(String::from("test-secret")),
        _ => None,
    })
    .unwrap();
    let local = unique();
    let payload = |email: String, username: String| {
        let data = serde_json::json!({
            "email": email,
            "username": username,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "password": "secret"
        });
        let data = serde_json::from_value(data).unwrap();
        UserCreateForm::try_from(&Form::from_data(data)).unwrap()
    };

    let cook = register_user(
        &payload(format!("Chef.{local}@Example.io"), format!("chef_{local}")),
        &pool,
    )
    .await
    .unwrap();
    assert_eq!(cook.email, format!("chef.{local}@example.io"));

    let err = register_user(
        &payload(format!("chef.{local}@example.io"), format!("other_{local}")),
        &pool,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(err.field.as_deref(), Some("email"));

    for email in [format!("CHEF.{local}@EXAMPLE.IO"), format!("chef.{local}@example.io")] {
        let token = login_user(&email, "secret", &config, &pool).await.unwrap();
        let claims = verify_jwt_session(&token, &config.secret_key).unwrap();
        assert_eq!(claims.user_id, cook.id);
    }
}

#[tokio::test]
async fn login_and_password_change() {
    let Some((pool, _media)) = setup().await else { return };

    let config = Config::from_lookup(|key| match key {
        "SECRET_KEY" => Some(String::from("test-secret")),
        _ => None,
    })
    .unwrap();
    let cook = user(&pool).await;

    let token = login_user(&cook.email, "secret", &config, &pool).await.unwrap();
    let claims = verify_jwt_session(&token, &config.secret_key).unwrap();
    assert_eq!(claims.user_id, cook.id);

    let err = login_user(&cook.email, "wrong", &config, &pool)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);

    let err = set_password(
        cook.id,
        &SetPasswordForm {
            new_password: String::from("new-secret"),
            current_password: String::from("wrong"),
        },
        &pool,
    )
    .await
    .unwrap_err();
    assert_eq!(err.field.as_deref(), Some("current_password"));

    set_password(
        cook.id,
        &SetPasswordForm {
            new_password: String::from("new-secret"),
            current_password: String::from("secret"),
        },
        &pool,
    )
    .await
    .unwrap();
    assert!(login_user(&cook.email, "new-secret", &config, &pool).await.is_ok());
}
