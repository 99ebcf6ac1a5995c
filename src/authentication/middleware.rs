use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    actions::get_user_by_id,
    constants::TOKEN_PREFIXES,
    error::{Error, ErrorKind},
    state::Context,
};

use super::jwt::{verify_jwt_session, SessionData};

/// Extracts the token from `Token <jwt>` or `Bearer <jwt>`.
fn parse_token(header: &str) -> Option<&str> {
    TOKEN_PREFIXES
        .iter()
        .find_map(|prefix| header.strip_prefix(prefix))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn resolve_session(
    header: Option<String>,
    context: Arc<Context>,
) -> Result<Option<SessionData>, Error> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let token = parse_token(&header)
        .ok_or_else(|| ErrorKind::Unauthorized.new("Invalid token header."))?;
    let claims = verify_jwt_session(token, &context.config.secret_key)?;

    let user = get_user_by_id(&context.pool, claims.user_id)
        .await?
        .ok_or_else(|| ErrorKind::Unauthorized.new("User inactive or deleted."))?;

    Ok(Some(SessionData::from(&user)))
}

pub fn with_session(
    context: Arc<Context>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let context = context.clone();
        async move {
            match resolve_session(header, context).await {
                Ok(Some(session)) => Ok(session),
                Ok(None) => Err(Rejection::from(ErrorKind::Unauthorized.default())),
                Err(e) => Err(Rejection::from(e)),
            }
        }
    })
}

/// Anonymous callers pass through as `None`; a bad token is still rejected.
pub fn with_possible_session(
    context: Arc<Context>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let context = context.clone();
        async move {
            resolve_session(header, context)
                .await
                .map_err(Rejection::from)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_prefixes_are_accepted() {
        assert_eq!(parse_token("Token abc.def"), Some("abc.def"));
        assert_eq!(parse_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_token("Basic abc"), None);
        assert_eq!(parse_token("Token   "), None);
    }
}
