use std::sync::Arc;

use warp::{
    filters::{path::FullPath, BoxedFilter},
    http::StatusCode,
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    actions::{
        add_recipe_relation, aggregate_shopping_list, create_recipe, delete_recipe, fetch_recipes,
        get_recipe_detail, get_recipe_mut, get_recipe_short, remove_recipe_relation,
        render_shopping_list, update_recipe, RecipeRelation,
    },
    authentication::permissions::ActionType,
    constants::SHOPPING_LIST_FILENAME,
    error::ErrorKind,
    filters::RecipeFilter,
    form::{Form, RecipeForm},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageLink, PageQuery},
    representation::{RecipeShortView, RecipeView},
    schema::Id,
    state::{with_context, Context},
};

use super::{no_content, reply_json, with_form, with_query, QueryPairs};

async fn recipe_view(
    id: Id,
    viewer: Option<Id>,
    context: &Context,
) -> Result<RecipeView, crate::Error> {
    let detail = get_recipe_detail(id, viewer, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    Ok(RecipeView::new(detail, &context.config.media_url))
}

async fn list_recipes(
    session: Option<SessionData>,
    path: FullPath,
    query: QueryPairs,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_pairs(&query)?;
    let page = PageQuery::from_pairs(&query)?;
    let viewer = session.map(|s| s.user_id);

    let (details, total) = fetch_recipes(&filter, viewer, &page, &context.pool).await?;
    let link = PageLink::new(path.as_str(), &query);
    let media_url = &context.config.media_url;
    let body = PageContext::from_rows(details, total, &page, &link)?
        .map(|detail| RecipeView::new(detail, media_url));

    Ok(reply_json(&body, StatusCode::OK))
}

async fn retrieve_recipe(
    id: Id,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let view = recipe_view(id, session.map(|s| s.user_id), &context).await?;
    Ok(reply_json(&view, StatusCode::OK))
}

async fn new_recipe(
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let form = RecipeForm::for_create(&form)?;

    let id = create_recipe(
        session.user_id,
        &form,
        &context.config.media_root,
        &context.pool,
    )
    .await?;
    let view = recipe_view(id, Some(session.user_id), &context).await?;

    Ok(reply_json(&view, StatusCode::CREATED))
}

async fn edit_recipe(
    id: Id,
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(id, &session, &context.pool).await?;
    let form = RecipeForm::for_update(&form)?;

    update_recipe(&recipe, &form, &context.config.media_root, &context.pool).await?;
    let view = recipe_view(id, Some(session.user_id), &context).await?;

    Ok(reply_json(&view, StatusCode::OK))
}

async fn remove_recipe(
    id: Id,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(id, &session, &context.pool).await?;
    delete_recipe(&recipe, &context.config.media_root, &context.pool).await?;

    Ok(no_content())
}

async fn add_relation(
    id: Id,
    relation: RecipeRelation,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    let recipe = get_recipe_short(id, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    add_recipe_relation(relation, session.user_id, id, &context.pool).await?;

    Ok(reply_json(
        &RecipeShortView::new(recipe, &context.config.media_url),
        StatusCode::CREATED,
    ))
}

async fn remove_relation(
    id: Id,
    relation: RecipeRelation,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    get_recipe_short(id, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    remove_recipe_relation(relation, session.user_id, id, &context.pool).await?;

    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let items = aggregate_shopping_list(session.user_id, &context.pool).await?;
    let text = render_shopping_list(&items);

    Ok(warp::reply::with_header(
        text,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response())
}

fn relation_routes(
    segment: &'static str,
    relation: RecipeRelation,
    context: Arc<Context>,
) -> BoxedFilter<(Response,)> {
    let add = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::any().map(move || relation))
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(add_relation);

    let remove = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end())
        .and(warp::delete())
        .and(warp::any().map(move || relation))
        .and(with_session(context.clone()))
        .and(with_context(context))
        .and_then(remove_relation);

    add.or(remove).unify().boxed()
}

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let limit = context.config.max_body_bytes;

    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(warp::path::full())
        .and(with_query())
        .and(with_context(context.clone()))
        .and_then(list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(new_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(download_shopping_cart);

    let retrieve = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(retrieve_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch().or(warp::put()).unify())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(edit_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(remove_recipe);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(relation_routes(
            "favorite",
            RecipeRelation::Favorite,
            context.clone(),
        ))
        .unify()
        .or(relation_routes(
            "shopping_cart",
            RecipeRelation::ShoppingCart,
            context,
        ))
        .unify()
        .boxed()
}
