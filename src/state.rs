use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::config::Config;

/// Shared handles every request handler receives.
pub struct Context {
    pub pool: Pool<Postgres>,
    pub config: Config,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Arc<Self> {
        Arc::new(Self { pool, config })
    }
}

pub fn with_context(
    context: Arc<Context>,
) -> impl Filter<Extract = (Arc<Context>,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}
