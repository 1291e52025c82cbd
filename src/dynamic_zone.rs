use serde_json::Value;

pub const COMPONENT_KEY: &str = "strapi_component";

/// A dynamic zone is an array in which some element names its component.
pub fn is_dynamic_zone(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| {
            item.as_object()
                .is_some_and(|item| item.contains_key(COMPONENT_KEY))
        }),
        _ => false,
    }
}
