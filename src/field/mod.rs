//! Field classification and traversal of loosely typed CMS entities.

use std::collections::HashSet;

use serde_json::{Map, Value};

mod image;
mod markdown;
pub mod walker;

pub use markdown::parser::image_destinations;

/// Attached to image fields, holds the id of the downloaded file node.
pub const LOCAL_FILE_KEY: &str = "localFile___NODE";

const IMAGES_KEY_SUFFIX: &str = "_images___NODE";

/// Sibling key collecting the file node ids of a markdown field's images.
pub fn images_key(field: &str) -> String {
    format!("{field}{IMAGES_KEY_SUFFIX}")
}

/// Fields eligible for markdown image extraction for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldScan {
    fields: HashSet<String>,
}

impl FieldScan {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_eligible(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What a value is, decided before the walker touches it.
pub enum FieldKind<'v> {
    Image(&'v mut Map<String, Value>),
    Sequence(&'v mut Vec<Value>),
    Container(&'v mut Map<String, Value>),
    Scalar,
}

impl<'v> FieldKind<'v> {
    pub fn classify(value: &'v mut Value) -> Self {
        match value {
            Value::Object(map) => {
                if is_image(map) {
                    Self::Image(map)
                } else {
                    Self::Container(map)
                }
            }
            Value::Array(items) => Self::Sequence(items),
            _ => Self::Scalar,
        }
    }
}

/// Media metadata carries both a `mime` and a `url` string.
pub fn is_image(map: &Map<String, Value>) -> bool {
    map.get("mime").is_some_and(Value::is_string) && map.get("url").is_some_and(Value::is_string)
}

/// A markdown field is an eligible key holding a string.
pub fn is_markdown(key: &str, value: &Value, scan: &FieldScan) -> bool {
    value.is_string() && scan.is_eligible(key)
}

/// Renders an `id` attribute the way it appears in cache keys.
pub(crate) fn id_fragment(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// The parts of an image field the extractor consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageField {
    pub id: Option<String>,
    pub url: String,
    pub updated_at: Option<String>,
}

impl ImageField {
    pub(crate) fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let url = map.get("url")?.as_str()?.to_owned();
        let updated_at = ["updatedAt", "updated_at"]
            .into_iter()
            .filter_map(|key| map.get(key))
            .find(|value| !value.is_null())
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        Some(Self {
            id: map.get("id").and_then(id_fragment),
            url,
            updated_at,
        })
    }
}
