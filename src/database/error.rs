use std::convert::Infallible;

use serde_json::{Map, Value};
use thiserror::Error as ThisError;
use warp::{
    http::StatusCode,
    reject::{self, Rejection},
    Reply,
};

/// Storage constraints that surface to clients as validation errors.
/// (constraint, field, message)
const CONSTRAINT_TABLE: &[(&str, &str, &str)] = &[
    ("users_email_key", "email", "A user with that email already exists."),
    ("users_username_key", "username", "A user with that username already exists."),
    ("unique_following", "errors", "You are already subscribed to this user."),
    ("prevent_self_follow", "errors", "You cannot subscribe to yourself."),
    ("tags_slug_key", "slug", "Tag with this slug already exists."),
    (
        "unique_ingredient",
        "errors",
        "Ingredient with this name and measurement unit already exists.",
    ),
    ("unique_recipe_for_author", "name", "You already have a recipe with this name."),
    ("positive_cooking_time", "cooking_time", "Cooking time must be at least 1 minute."),
    ("unique_ingredient_in_recipe", "ingredients", "Ingredients in a recipe must not repeat."),
    ("positive_amount", "ingredients", "Ingredient amount must be at least 1."),
    ("unique_recipe_for_user", "errors", "Recipe is already in favorites."),
    ("unique_shopping_list_user", "errors", "Recipe is already in the shopping cart."),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn new(self, info: &str) -> Error {
        Error {
            kind: self,
            field: None,
            info: info.to_string(),
        }
    }

    /// Error attached to a single payload field.
    pub fn field(self, field: &str, info: &str) -> Error {
        Error {
            kind: self,
            field: Some(field.to_string()),
            info: info.to_string(),
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_message())
    }

    fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "Invalid request.",
            ErrorKind::Unauthorized => "Authentication credentials were not provided.",
            ErrorKind::Forbidden => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "Not found.",
            ErrorKind::Internal => "Internal server error.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {info}")]
pub struct Error {
    pub kind: ErrorKind,
    pub field: Option<String>,
    pub info: String,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// JSON body sent to the client. Internal details never leave the server.
    pub fn body(&self) -> Value {
        let mut body = Map::new();

        match (self.kind, &self.field) {
            (ErrorKind::Internal, _) => {
                body.insert(
                    "detail".to_string(),
                    Value::from(self.kind.default_message()),
                );
            }
            (_, Some(field)) if field != "errors" => {
                body.insert(
                    field.to_owned(),
                    Value::Array(vec![Value::from(self.info.as_str())]),
                );
            }
            (ErrorKind::InvalidRequest, _) => {
                body.insert("errors".to_string(), Value::from(self.info.as_str()));
            }
            _ => {
                body.insert("detail".to_string(), Value::from(self.info.as_str()));
            }
        }

        Value::Object(body)
    }
}

impl reject::Reject for Error {}

#[derive(Debug, ThisError)]
#[error("{info}")]
pub struct QueryError {
    info: String,
    constraint: Option<String>,
    violation: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            constraint: None,
            violation: false,
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let violation = matches!(
                    e.kind(),
                    sqlx::error::ErrorKind::UniqueViolation
                        | sqlx::error::ErrorKind::CheckViolation
                        | sqlx::error::ErrorKind::ForeignKeyViolation
                );

                Self {
                    info: format!("{e}"),
                    constraint: e.constraint().map(str::to_string),
                    violation,
                }
            }
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if !value.violation {
            return ErrorKind::Internal.new(&value.info);
        }

        let known = value.constraint.as_deref().and_then(|constraint| {
            CONSTRAINT_TABLE
                .iter()
                .find(|(name, _, _)| *name == constraint)
        });

        match known {
            Some((_, field, message)) => ErrorKind::InvalidRequest.field(field, message),
            None => {
                log::trace!("Unmapped constraint violation: {}", value.info);
                ErrorKind::InvalidRequest.new("Referenced object is invalid or already exists.")
            }
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

fn detail(message: &str) -> Value {
    let mut body = Map::new();
    body.insert("detail".to_string(), Value::from(message));
    Value::Object(body)
}

/// Converts every rejection produced by the route tree into a JSON reply.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = err.find::<Error>() {
        if e.kind == ErrorKind::Internal {
            log::error!("{e}");
        } else {
            log::trace!("{e}");
        }
        (e.status(), e.body())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, detail("Not found."))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        let mut body = Map::new();
        body.insert("errors".to_string(), Value::from(e.to_string()));
        (StatusCode::BAD_REQUEST, Value::Object(body))
    } else if err.find::<reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, detail("Invalid query string."))
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, detail("Request body is too large."))
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail("Unsupported media type."),
        )
    } else if err.find::<reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, detail("Content-Length required."))
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, detail("Method not allowed."))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("Internal server error."),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
