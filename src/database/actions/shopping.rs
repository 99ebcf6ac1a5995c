use sqlx::{Pool, Postgres};

use crate::{
    error::QueryError,
    schema::{Id, ShoppingListItem},
};

/// Sums ingredient amounts over every recipe in the user's shopping cart,
/// grouped by (name, measurement unit) and ordered by name.
pub async fn aggregate_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, crate::Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(ia.amount)::BIGINT AS total
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        INNER JOIN shopping_lists sl ON sl.recipe_id = ia.recipe_id
        WHERE sl.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Plain-text rendering of an aggregated shopping list.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut s = String::from("Shopping list\n\n");

    if items.is_empty() {
        s += "Your shopping cart is empty.\n";
        return s;
    }

    items.iter().for_each(|item| {
        s += &format!(
            "- {} ({}): {}\n",
            item.name, item.measurement_unit, item.total
        );
    });

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, total: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total,
        }
    }

    #[test]
    fn renders_one_line_per_ingredient() {
        let text = render_shopping_list(&[item("Flour", "g", 700), item("Milk", "ml", 250)]);

        assert_eq!(
            text,
            "Shopping list\n\n- Flour (g): 700\n- Milk (ml): 250\n"
        );
    }

    #[test]
    fn empty_cart_says_so() {
        let text = render_shopping_list(&[]);
        assert!(text.contains("empty"));
    }
}
