use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::field::FieldScan;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Log and leave the field without a local reference.
    Skip,
    /// Fail the owning entity once its traversal has finished.
    Propagate,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailurePolicy {
    #[serde(default = "FailurePolicy::default_image")]
    pub image: OnFailure,
    #[serde(default = "FailurePolicy::default_markdown")]
    pub markdown: OnFailure,
}

impl FailurePolicy {
    fn default_image() -> OnFailure {
        OnFailure::Propagate
    }

    fn default_markdown() -> OnFailure {
        OnFailure::Skip
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            image: Self::default_image(),
            markdown: Self::default_markdown(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkdownImages {
    /// Entity type name to the fields scanned for markdown images.
    #[serde(default, alias = "typesToParse")]
    pub types_to_parse: IndexMap<String, Vec<String>>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EntityType {
    pub name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(alias = "apiURL")]
    pub api_url: String,
    #[serde(default, alias = "jwtToken")]
    pub jwt_token: Option<String>,
    #[serde(default, alias = "markdownImages")]
    pub markdown_images: MarkdownImages,
    #[serde(default)]
    pub types: Vec<EntityType>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default = "Config::default_cache_db")]
    pub cache_db: String,
    #[serde(default = "Config::default_download_dir")]
    pub download_dir: PathBuf,
}

impl Config {
    fn default_cache_db() -> String {
        "sqlite://.strapi-media/cache.db".to_owned()
    }

    fn default_download_dir() -> PathBuf {
        PathBuf::from(".strapi-media/files")
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.api_url)
            .map_err(|error| format!("api_url {:?} is not a valid url: {error}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("api_url {:?} must be http(s)", self.api_url));
        }
        if self.concurrency == Some(0) {
            return Err("concurrency must be greater than 0".to_owned());
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn field_scan(&self, entity_type: &str) -> FieldScan {
        resolve_field_scan(&self.types, &self.markdown_images, entity_type)
    }
}

/// Resolves an entity type name against the declared types and returns the
/// fields eligible for markdown image extraction. Unknown types scan nothing.
pub fn resolve_field_scan(
    types: &[EntityType],
    markdown_images: &MarkdownImages,
    entity_type: &str,
) -> FieldScan {
    let declared = types
        .iter()
        .find(|ty| ty.name == entity_type)
        .or_else(|| {
            types
                .iter()
                .find(|ty| ty.name.eq_ignore_ascii_case(entity_type))
        });
    let Some(declared) = declared else {
        debug!(%entity_type, "Entity type is not declared, markdown scanning disabled");
        return FieldScan::default();
    };
    match markdown_images.types_to_parse.get(&declared.name) {
        Some(fields) => FieldScan::new(fields),
        None => FieldScan::default(),
    }
}
