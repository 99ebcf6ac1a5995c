use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use crate::{
    actions::login_user,
    form::{Form, LoginForm},
    jwt::SessionData,
    middleware::with_session,
    representation::TokenView,
    state::{with_context, Context},
};

use super::{no_content, reply_json, with_form};

async fn login(form: Form, context: Arc<Context>) -> Result<Response, Rejection> {
    let form = LoginForm::try_from(&form)?;
    let auth_token = login_user(&form.email, &form.password, &context.config, &context.pool).await?;

    Ok(reply_json(&TokenView { auth_token }, StatusCode::OK))
}

async fn logout(session: SessionData) -> Result<Response, Rejection> {
    // tokens are stateless; they simply expire
    log::trace!("> User {} logged out", session.user_id);
    Ok(no_content())
}

pub fn routes(context: Arc<Context>) -> BoxedFilter<(Response,)> {
    let limit = context.config.max_body_bytes;

    let login_route = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(with_form(limit))
        .and(with_context(context.clone()))
        .and_then(login);

    let logout_route = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(context))
        .and_then(logout);

    login_route.or(logout_route).unify().boxed()
}
