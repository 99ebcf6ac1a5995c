use crate::{
    error::{Error, ErrorKind},
    schema::Id,
};

/// Query parameters accepted by the recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ErrorKind::InvalidRequest.field(key, "Enter a valid boolean.")),
    }
}

impl RecipeFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, Error> {
        let mut filter = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "author" => {
                    let author = value
                        .parse::<Id>()
                        .map_err(|_| ErrorKind::InvalidRequest.field("author", "Enter a number."))?;
                    filter.author = Some(author);
                }
                "tags" => {
                    if !value.is_empty() && !filter.tags.contains(value) {
                        filter.tags.push(value.to_owned());
                    }
                }
                "is_favorited" => filter.is_favorited = parse_flag(key, value)?,
                "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(key, value)?,
                _ => {}
            }
        }

        Ok(filter)
    }
}

/// Query parameters accepted by the ingredient listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientFilter {
    /// Case-sensitive name prefix.
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let name = pairs
            .iter()
            .rev()
            .find(|(key, _)| key == "name")
            .map(|(_, value)| value.to_owned())
            .filter(|value| !value.is_empty());

        Self { name }
    }
}

/// `recipes_limit` for subscription listings; malformed values are ignored.
pub fn parse_recipes_limit(pairs: &[(String, String)]) -> Option<i64> {
    pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "recipes_limit")
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
}
