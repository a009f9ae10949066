//! Product list flattening and item mapping.

use serde_json::{Map, Value};

use super::fields::{
    first_non_blank, first_present, first_text, format_count, value_to_f64, value_to_string,
    ADDON_COUNT, ADDON_NAME, ITEM_COMMENT, ITEM_EXCLUDE, ITEM_ID, ITEM_INCLUDE, ITEM_NAME,
    ITEM_QUANTITY,
};
use crate::types::OrderItem;

/// Separator between the exclusions text and the free-form item comment.
pub const COMMENT_SEPARATOR: &str = " • ";

/// Map a raw product list to order items.
///
/// Arrays are flattened to any depth; only object entries become items.
/// Anything other than an array yields no items.
pub(crate) fn normalize_items(products: Option<&Value>, order_id: &str) -> Vec<OrderItem> {
    let Some(products) = products else {
        return Vec::new();
    };
    if !products.is_array() {
        return Vec::new();
    }

    let mut objects = Vec::new();
    collect_objects(products, &mut objects);

    let id_prefix = if order_id.is_empty() {
        "unknown"
    } else {
        order_id
    };

    objects
        .into_iter()
        .enumerate()
        .map(|(index, product)| normalize_item(product, index, id_prefix))
        .collect()
}

fn collect_objects<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Array(entries) => {
            for entry in entries {
                collect_objects(entry, out);
            }
        }
        Value::Object(object) => out.push(object),
        _ => {}
    }
}

fn normalize_item(product: &Map<String, Value>, index: usize, id_prefix: &str) -> OrderItem {
    let id = first_present(product, ITEM_ID)
        .and_then(value_to_string)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("{id_prefix}-{index}"));

    let name = first_non_blank(product, ITEM_NAME)
        .and_then(value_to_string)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("Item {}", index + 1));

    let quantity = first_present(product, ITEM_QUANTITY)
        .and_then(value_to_f64)
        .map(to_quantity)
        .unwrap_or(1);

    OrderItem {
        id,
        name,
        quantity,
        comment: merge_comment(product),
        addons: normalize_addons(first_present(product, ITEM_INCLUDE)),
    }
}

/// Positive whole quantity; anything below one counts as one.
fn to_quantity(value: f64) -> u32 {
    if value >= 1.0 {
        value.trunc().min(u32::MAX as f64) as u32
    } else {
        1
    }
}

fn merge_comment(product: &Map<String, Value>) -> Option<String> {
    let parts: Vec<&str> = [
        first_text(product, ITEM_EXCLUDE),
        first_text(product, ITEM_COMMENT),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(COMMENT_SEPARATOR))
    }
}

fn normalize_addons(include: Option<&Value>) -> Option<Vec<String>> {
    let addons: Vec<String> = include?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .filter_map(format_addon)
        .collect();

    if addons.is_empty() {
        None
    } else {
        Some(addons)
    }
}

/// `"name"`, or `"name xN"` when the count exceeds one.
fn format_addon(extra: &Map<String, Value>) -> Option<String> {
    let name = first_non_blank(extra, ADDON_NAME)
        .and_then(value_to_string)
        .filter(|name| !name.trim().is_empty())?;
    let count = first_present(extra, ADDON_COUNT)
        .and_then(value_to_f64)
        .unwrap_or(1.0);

    if count > 1.0 {
        Some(format!("{name} x{}", format_count(count)))
    } else {
        Some(name)
    }
}
