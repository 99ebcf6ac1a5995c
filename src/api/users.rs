use std::sync::Arc;

use warp::{
    filters::{path::FullPath, BoxedFilter},
    http::StatusCode,
    reply::Response,
    Filter, Rejection,
};

use crate::{
    actions::{
        fetch_subscriptions, fetch_users, get_subscription, get_user_by_id, get_user_row,
        list_author_recipes, register_user, set_password, subscribe, unsubscribe, update_user,
    },
    authentication::permissions::ActionType,
    error::ErrorKind,
    filters::parse_recipes_limit,
    form::{Form, SetPasswordForm, UserCreateForm, UserUpdateForm},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageLink, PageQuery},
    representation::{CreatedUserView, SubscriptionView, UserView},
    schema::Id,
    state::{with_context, Context},
};

use super::{no_content, reply_json, with_form, with_query, QueryPairs};

async fn list_users(
    session: Option<SessionData>,
    path: FullPath,
    query: QueryPairs,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let page = PageQuery::from_pairs(&query)?;
    let viewer = session.map(|s| s.user_id);

    let (rows, total) = fetch_users(viewer, &page, &context.pool).await?;
    let link = PageLink::new(path.as_str(), &query);
    let body = PageContext::from_rows(rows, total, &page, &link)?.map(UserView::from);

    Ok(reply_json(&body, StatusCode::OK))
}

async fn create_user(form: Form, context: Arc<Context>) -> Result<Response, Rejection> {
    let form = UserCreateForm::try_from(&form)?;
    let user = register_user(&form, &context.pool).await?;

    Ok(reply_json(&CreatedUserView::from(&user), StatusCode::CREATED))
}

async fn retrieve_user(
    id: Id,
    session: Option<SessionData>,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let row = get_user_row(id, session.map(|s| s.user_id), &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    Ok(reply_json(&UserView::from(row), StatusCode::OK))
}

async fn current_user(session: SessionData, context: Arc<Context>) -> Result<Response, Rejection> {
    let user = get_user_by_id(&context.pool, session.user_id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    Ok(reply_json(&UserView::from_user(&user, false), StatusCode::OK))
}

async fn update_current_user(
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let form = UserUpdateForm::try_from(&form)?;
    let user = update_user(session.user_id, &form, &context.pool).await?;

    Ok(reply_json(&UserView::from_user(&user, false), StatusCode::OK))
}

async fn change_password(
    session: SessionData,
    form: Form,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let form = SetPasswordForm::try_from(&form)?;
    set_password(session.user_id, &form, &context.pool).await?;

    log::info!("User {} changed their password", session.user_id);
    Ok(no_content())
}

async fn list_subscriptions(
    session: SessionData,
    path: FullPath,
    query: QueryPairs,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    let page = PageQuery::from_pairs(&query)?;
    let recipes_limit = parse_recipes_limit(&query);

    let (rows, total) = fetch_subscriptions(session.user_id, &page, &context.pool).await?;
    let author_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut recipes = list_author_recipes(&author_ids, recipes_limit, &context.pool).await?;

    let link = PageLink::new(path.as_str(), &query);
    let media_url = &context.config.media_url;
    let body = PageContext::from_rows(rows, total, &page, &link)?.map(|row| {
        let list = recipes.remove(&row.id).unwrap_or_default();
        SubscriptionView::new(row, list, media_url)
    });

    Ok(reply_json(&body, StatusCode::OK))
}

async fn create_subscription(
    author_id: Id,
    session: SessionData,
    query: QueryPairs,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    get_user_by_id(&context.pool, author_id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    subscribe(session.user_id, author_id, &context.pool).await?;

    let row = get_subscription(session.user_id, author_id, &context.pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;
    let mut recipes =
        list_author_recipes(&[author_id], parse_recipes_limit(&query), &context.pool).await?;
    let list = recipes.remove(&author_id).unwrap_or_default();

    Ok(reply_json(
        &SubscriptionView::new(row, list, &context.config.media_url),
        StatusCode::CREATED,
    ))
}

async fn delete_subscription(
    author_id: Id,
    session: SessionData,
    context: Arc<Context>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    get_user_by_id(&context.pool, author_id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;

    unsubscribe(session.user_id, author_id, &context.pool).await?;

    Ok(no_content())
}

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let limit = context.config.max_body_bytes;

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(warp::path::full())
        .and(with_query())
        .and(with_context(context.clone()))
        .and_then(list_users);

    let create = warp::path!("api" / "users")
        .and(warp::post())
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(create_user);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(current_user);

    let update_me = warp::path!("api" / "users" / "me")
        .and(warp::patch())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(update_current_user);

    let password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(change_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(with_session(context.clone()))
        .and(warp::path::full())
        .and(with_query())
        .and(with_context(context.clone()))
        .and_then(list_subscriptions);

    let retrieve = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(context.clone()))
        .and(with_context(context.clone()))
        .and_then(retrieve_user);

    let subscribe_route = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(context.clone()))
        .and(with_query())
        .and(with_context(context.clone()))
        .and_then(create_subscription);

    let unsubscribe_route = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(context.clone()))
        .and(with_context(context))
        .and_then(delete_subscription);

    list.or(create)
        .unify()
        .or(me)
        .unify()
        .or(update_me)
        .unify()
        .or(password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe_route)
        .unify()
        .or(unsubscribe_route)
        .unify()
        .boxed()
}
