use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use crate::{
    actions::{create_ingredient, create_tag, get_ingredient, get_tag, list_ingredients, list_tags},
    authentication::permissions::ActionType,
    error::ErrorKind,
    filters::IngredientFilter,
    form::{Form, IngredientForm, TagForm},
    jwt::SessionData,
    middleware::with_session,
    schema::Id,
    state::{with_context, Context},
};

use super::{reply_json, with_form, with_query, QueryPairs};

// Tags

async fn tag_list(context: Arc<Context>) -> Result<Response, Rejection> {
    let tags = list_tags(&context.pool).await?;
    Ok(reply_json(&tags, StatusCode::OK))
}

async fn tag_detail(id: Id, context: Arc<Context>) -> Result<Response, Rejection> {
    let tag = get_tag(id, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    Ok(reply_json(&tag, StatusCode::OK))
}

async fn tag_create(
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageCatalog)?;
    let form = TagForm::try_from(&form)?;
    let tag = create_tag(&form, &context.pool).await?;

    Ok(reply_json(&tag, StatusCode::CREATED))
}

// Ingredients

async fn ingredient_list(query: QueryPairs, context: Arc<Context>) -> Result<Response, Rejection> {
    let filter = IngredientFilter::from_pairs(&query);
    let ingredients = list_ingredients(filter.name.as_deref(), &context.pool).await?;

    Ok(reply_json(&ingredients, StatusCode::OK))
}

async fn ingredient_detail(id: Id, context: Arc<Context>) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    Ok(reply_json(&ingredient, StatusCode::OK))
}

async fn ingredient_create(
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageCatalog)?;
    let form = IngredientForm::try_from(&form)?;
    let ingredient = create_ingredient(&form, &context.pool).await?;

    Ok(reply_json(&ingredient, StatusCode::CREATED))
}

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let limit = context.config.max_body_bytes;

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(tag_list);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(tag_detail);

    let new_tag = warp::path!("api" / "tags")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(tag_create);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(with_query())
        .and(with_context(context.clone()))
        .and_then(ingredient_list);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(ingredient_detail);

    let new_ingredient = warp::path!("api" / "ingredients")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context))
        .and_then(ingredient_create);

    tags.or(tag)
        .unify()
        .or(new_tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .or(new_ingredient)
        .unify()
        .boxed()
}
