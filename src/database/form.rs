use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    constants::{
        COLOR_RE, DEFAULT_TAG_COLOR, EMAIL_MAX_LENGTH, EMAIL_RE, MIN_COOKING_TIME,
        MIN_INGREDIENT_AMOUNT, NAME_MAX_LENGTH, SLUG_RE, USERNAME_RE, USER_FIELD_MAX_LENGTH,
    },
    error::{Error, ErrorKind},
    schema::Id,
};

pub type FormData = HashMap<String, Value>;

const REQUIRED: &str = "This field is required.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";
const NOT_A_LIST: &str = "Expected a list of items.";
const BLANK: &str = "This field may not be blank.";

fn invalid(field: &str, info: &str) -> Error {
    ErrorKind::InvalidRequest.field(field, info)
}

/// Integers arrive either as JSON numbers or as numeric strings.
fn value_as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.inner.get(key), Some(value) if !value.is_null())
    }

    pub fn get_str(&self, key: &str) -> Result<String, Error> {
        match self.inner.get(key) {
            Some(Value::String(v)) => Ok(v.to_string()),
            Some(Value::Null) | None => Err(invalid(key, REQUIRED)),
            Some(_) => Err(invalid(key, NOT_A_STRING)),
        }
    }

    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, Error> {
        if !self.contains(key) {
            return Ok(None);
        }
        self.get_str(key).map(Some)
    }

    pub fn get_integer(&self, key: &str) -> Result<i64, Error> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Err(invalid(key, REQUIRED)),
            Some(value) => value_as_integer(value).ok_or_else(|| invalid(key, NOT_AN_INTEGER)),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<&Vec<Value>, Error> {
        match self.inner.get(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Err(invalid(key, REQUIRED)),
            Some(_) => Err(invalid(key, NOT_A_LIST)),
        }
    }

    /// Required, non-blank string of bounded length.
    fn get_text(&self, key: &str, max_length: usize) -> Result<String, Error> {
        let value = self.get_str(key)?;
        check_text(key, &value, max_length)?;
        Ok(value)
    }

    fn get_optional_text(&self, key: &str, max_length: usize) -> Result<Option<String>, Error> {
        match self.get_optional_str(key)? {
            Some(value) => {
                check_text(key, &value, max_length)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

fn check_text(key: &str, value: &str, max_length: usize) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(invalid(key, BLANK));
    }
    if value.chars().count() > max_length {
        return Err(invalid(
            key,
            &format!("Ensure this field has no more than {max_length} characters."),
        ));
    }
    Ok(())
}

// Recipes

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmountForm>,
    pub tags: Vec<Id>,
    /// Base64 data URI; required on create, optional on update.
    pub image: Option<String>,
}

impl RecipeForm {
    pub fn for_create(form: &Form) -> Result<Self, Error> {
        let recipe = Self::parse(form)?;
        if recipe.image.is_none() {
            return Err(invalid("image", REQUIRED));
        }
        Ok(recipe)
    }

    pub fn for_update(form: &Form) -> Result<Self, Error> {
        Self::parse(form)
    }

    fn parse(form: &Form) -> Result<Self, Error> {
        let name = form.get_text("name", NAME_MAX_LENGTH)?;
        let text = form.get_optional_str("text")?.unwrap_or_default();
        let cooking_time = parse_cooking_time(form)?;
        let ingredients = parse_ingredients(form.get_list("ingredients")?)?;
        let tags = parse_tags(form.get_list("tags")?)?;
        let image = form
            .get_optional_str("image")?
            .filter(|image| !image.trim().is_empty());

        Ok(Self {
            name,
            text,
            cooking_time,
            ingredients,
            tags,
            image,
        })
    }
}

fn parse_cooking_time(form: &Form) -> Result<i32, Error> {
    let cooking_time = form.get_integer("cooking_time")?;
    if cooking_time < MIN_COOKING_TIME {
        return Err(invalid(
            "cooking_time",
            "Cooking time must be at least 1 minute.",
        ));
    }
    i32::try_from(cooking_time).map_err(|_| invalid("cooking_time", NOT_AN_INTEGER))
}

/// Validates the nested ingredient list: integer ids, positive integer
/// amounts, and no ingredient mentioned twice.
pub fn parse_ingredients(items: &[Value]) -> Result<Vec<IngredientAmountForm>, Error> {
    if items.is_empty() {
        return Err(invalid("ingredients", "A recipe needs at least one ingredient."));
    }

    let mut seen: HashSet<Id> = HashSet::new();
    let mut parsed = Vec::with_capacity(items.len());

    for item in items {
        let object = item
            .as_object()
            .ok_or_else(|| invalid("ingredients", "Each ingredient must be an object."))?;

        let id = object
            .get("id")
            .and_then(value_as_integer)
            .and_then(|id| Id::try_from(id).ok())
            .ok_or_else(|| invalid("ingredients", "Each ingredient needs an integer id."))?;

        let amount = object
            .get("amount")
            .and_then(value_as_integer)
            .ok_or_else(|| {
                invalid(
                    "ingredients",
                    &format!("Amount of ingredient {id} must be an integer."),
                )
            })?;
        if amount < MIN_INGREDIENT_AMOUNT {
            return Err(invalid(
                "ingredients",
                &format!("Amount of ingredient {id} must be at least 1."),
            ));
        }
        let amount = i32::try_from(amount).map_err(|_| {
            invalid(
                "ingredients",
                &format!("Amount of ingredient {id} is too large."),
            )
        })?;

        if !seen.insert(id) {
            return Err(invalid(
                "ingredients",
                "Ingredients in a recipe must not repeat.",
            ));
        }

        parsed.push(IngredientAmountForm { id, amount });
    }

    Ok(parsed)
}

/// Tag ids; repeated ids collapse into one association.
pub fn parse_tags(items: &[Value]) -> Result<Vec<Id>, Error> {
    let mut tags: Vec<Id> = Vec::with_capacity(items.len());
    for item in items {
        let id = value_as_integer(item)
            .and_then(|id| Id::try_from(id).ok())
            .ok_or_else(|| invalid("tags", "Tags must be given as integer ids."))?;
        if !tags.contains(&id) {
            tags.push(id);
        }
    }
    Ok(tags)
}

// Users

// Emails are stored lowercased so the unique constraint covers every spelling.
fn check_email(email: &str) -> Result<(), Error> {
    check_text("email", email, EMAIL_MAX_LENGTH)?;
    if !EMAIL_RE.is_match(email) {
        return Err(invalid("email", "Enter a valid email address."));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<(), Error> {
    check_text("username", username, USER_FIELD_MAX_LENGTH)?;
    if !USERNAME_RE.is_match(username) {
        return Err(invalid(
            "username",
            "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UserCreateForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl TryFrom<&Form> for UserCreateForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let email = form.get_str("email")?.to_lowercase();
        check_email(&email)?;
        let username = form.get_str("username")?;
        check_username(&username)?;
        let first_name = form.get_text("first_name", USER_FIELD_MAX_LENGTH)?;
        let last_name = form.get_text("last_name", USER_FIELD_MAX_LENGTH)?;
        let password = form.get_str("password")?;
        if password.is_empty() {
            return Err(invalid("password", BLANK));
        }

        Ok(Self {
            email,
            username,
            first_name,
            last_name,
            password,
        })
    }
}

/// Partial profile update; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateForm {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl TryFrom<&Form> for UserUpdateForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let email = form.get_optional_str("email")?.map(|email| email.to_lowercase());
        if let Some(email) = &email {
            check_email(email)?;
        }
        let username = form.get_optional_str("username")?;
        if let Some(username) = &username {
            check_username(username)?;
        }

        Ok(Self {
            email,
            username,
            first_name: form.get_optional_text("first_name", USER_FIELD_MAX_LENGTH)?,
            last_name: form.get_optional_text("last_name", USER_FIELD_MAX_LENGTH)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub current_password: String,
}

impl TryFrom<&Form> for SetPasswordForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let new_password = form.get_str("new_password")?;
        if new_password.is_empty() {
            return Err(invalid("new_password", BLANK));
        }

        Ok(Self {
            new_password,
            current_password: form.get_str("current_password")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl TryFrom<&Form> for LoginForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            email: form.get_str("email")?.to_lowercase(),
            password: form.get_str("password")?,
        })
    }
}

// Catalog

#[derive(Debug, Clone)]
pub struct TagForm {
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl TryFrom<&Form> for TagForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let name = form.get_text("name", NAME_MAX_LENGTH)?;
        let slug = form.get_text("slug", NAME_MAX_LENGTH)?;
        if !SLUG_RE.is_match(&slug) {
            return Err(invalid(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            ));
        }
        let color = form
            .get_optional_str("color")?
            .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
        if !COLOR_RE.is_match(&color) {
            return Err(invalid("color", "Enter a color in #RRGGBB format."));
        }

        Ok(Self {
            name,
            slug,
            color: color.to_lowercase(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

impl TryFrom<&Form> for IngredientForm {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            name: form.get_text("name", NAME_MAX_LENGTH)?,
            measurement_unit: form.get_text("measurement_unit", NAME_MAX_LENGTH)?,
        })
    }
}
