use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    config::Config,
    error::handle_rejection,
    form::{Form, FormData},
    state::Context,
};

pub mod auth;
pub mod catalog;
pub mod recipes;
pub mod users;

/// Raw query string pairs; repeated keys are kept in order.
pub type QueryPairs = Vec<(String, String)>;

pub fn with_query() -> impl Filter<Extract = (QueryPairs,), Error = Rejection> + Clone {
    warp::query::<QueryPairs>()
}

/// JSON object body, bounded by `limit` bytes.
pub fn with_form(limit: u64) -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit)
        .and(warp::body::json::<FormData>())
        .map(Form::from_data)
}

pub fn reply_json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Uploaded files under `MEDIA_URL`.
fn media_files(config: &Config) -> BoxedFilter<(Response,)> {
    let prefix = config
        .media_segments()
        .into_iter()
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment)).boxed()
        });

    prefix
        .and(warp::get())
        .and(warp::fs::dir(config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response())
        .boxed()
}

/// Every route of the service, still rejecting on failure.
pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    auth::routes(context.clone())
        .or(users::routes(context.clone()))
        .unify()
        .or(catalog::routes(context.clone()))
        .unify()
        .or(recipes::routes(context.clone()))
        .unify()
        .or(media_files(&context.config))
        .unify()
        .boxed()
}

/// The served filter: routes, JSON rejection bodies and request logging.
pub fn service(
    context: Arc<Context>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    routes(context)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}
