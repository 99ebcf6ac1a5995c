use serde::Serialize;

use crate::{
    actions::RecipeDetail,
    media::image_url,
    schema::{Id, RecipePart, RecipeShortRow, SubscriptionRow, Tag, User, UserRow},
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
        }
    }
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

/// Registration response; never carries the password.
#[derive(Serialize, Debug, Clone)]
pub struct CreatedUserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for CreatedUserView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct TokenView {
    pub auth_token: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeView {
    pub fn new(detail: RecipeDetail, media_url: &str) -> Self {
        let row = detail.row;

        Self {
            id: row.id,
            tags: detail.tags,
            author: UserView {
                email: row.author_email,
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
            },
            ingredients: detail
                .ingredients
                .into_iter()
                .map(RecipeIngredientView::from)
                .collect(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: image_url(&row.image, media_url),
            text: row.text,
            cooking_time: row.cooking_time,
        }
    }
}

/// Minimal recipe representation.
#[derive(Serialize, Debug, Clone)]
pub struct RecipeShortView {
    pub id: Id,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl RecipeShortView {
    pub fn new(row: RecipeShortRow, media_url: &str) -> Self {
        Self {
            id: row.id,
            image: image_url(&row.image, media_url),
            name: row.name,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortView>,
    pub recipes_count: i64,
}

impl SubscriptionView {
    pub fn new(row: SubscriptionRow, recipes: Vec<RecipeShortRow>, media_url: &str) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes: recipes
                .into_iter()
                .map(|recipe| RecipeShortView::new(recipe, media_url))
                .collect(),
            recipes_count: row.recipes_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::schema::RecipeRow;

    #[test]
    fn recipe_view_matches_api_shape() {
        let detail = RecipeDetail {
            row: RecipeRow {
                id: 3,
                name: String::from("Pancakes"),
                text: String::from("Mix and fry."),
                image: String::from("recipes/images/p.png"),
                cooking_time: 15,
                pub_date: Utc::now(),
                author_id: 1,
                author_email: String::from("cook@example.com"),
                author_username: String::from("cook"),
                author_first_name: String::from("Ada"),
                author_last_name: String::from("Lovelace"),
                author_is_subscribed: false,
                is_favorited: true,
                is_in_shopping_cart: false,
                count: 1,
            },
            tags: vec![Tag {
                id: 1,
                name: String::from("Breakfast"),
                color: String::from("#e26c2d"),
                slug: String::from("breakfast"),
            }],
            ingredients: vec![RecipePart {
                recipe_id: 3,
                ingredient_id: 9,
                name: String::from("Flour"),
                measurement_unit: String::from("g"),
                amount: 200,
            }],
        };

        let value = serde_json::to_value(RecipeView::new(detail, "/media/")).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 3,
                "tags": [{ "id": 1, "name": "Breakfast", "color": "#e26c2d", "slug": "breakfast" }],
                "author": {
                    "email": "cook@example.com",
                    "id": 1,
                    "username": "cook",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "is_subscribed": false
                },
                "ingredients": [{ "id": 9, "name": "Flour", "measurement_unit": "g", "amount": 200 }],
                "is_favorited": true,
                "is_in_shopping_cart": false,
                "name": "Pancakes",
                "image": "/media/recipes/images/p.png",
                "text": "Mix and fry.",
                "cooking_time": 15
            })
        );
    }

    #[test]
    fn subscription_view_is_always_subscribed() {
        let row = SubscriptionRow {
            id: 2,
            email: String::from("chef@example.com"),
            username: String::from("chef"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            recipes_count: 5,
            count: 1,
        };
        let recipes = vec![RecipeShortRow {
            id: 10,
            author_id: 2,
            name: String::from("Omelette"),
            image: String::new(),
            cooking_time: 5,
        }];

        let view = SubscriptionView::new(row, recipes, "/media/");

        assert!(view.is_subscribed);
        assert_eq!(view.recipes_count, 5);
        assert_eq!(view.recipes.len(), 1);
        assert_eq!(view.recipes[0].image, None);
    }
}
