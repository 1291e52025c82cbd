//! Media cache adapter
//!
//! Records are stored as loosely typed JSON so a host can share one cache
//! between several plugins. Two record shapes exist, keyed differently:
//! whole image fields are keyed by the media id, markdown images by the id of
//! the owning entity plus the image path as written in the markdown source.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::ErrorDetail;

mod memory;

pub use memory::MemoryCache;

pub const KEY_PREFIX: &str = "strapi-media";

pub fn image_key(id: &str) -> String {
    format!("{KEY_PREFIX}-{id}")
}

pub fn markdown_image_key(id: &str, path: &str) -> String {
    format!("{KEY_PREFIX}-{id}-{path}")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    #[serde(rename = "fileNodeID")]
    pub file_node_id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarkdownImageRecord {
    #[serde(rename = "fileNodeID")]
    pub file_node_id: String,
    #[serde(rename = "fileNodeBase")]
    pub file_node_base: String,
}

pub trait MediaCache {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send;

    fn set(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Reads a typed record. A record that does not decode counts as a miss.
pub(crate) async fn get_record<C, R>(cache: &C, key: &str) -> Result<Option<R>, ErrorDetail>
where
    C: MediaCache,
    R: DeserializeOwned,
{
    let Some(value) = cache.get(key).await.map_err(ErrorDetail::cache)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(record) => Ok(Some(record)),
        Err(error) => {
            warn!(%key, %error, "Discarding undecodable cache record");
            Ok(None)
        }
    }
}

pub(crate) async fn set_record<C, R>(cache: &C, key: &str, record: &R) -> Result<(), ErrorDetail>
where
    C: MediaCache,
    R: Serialize,
{
    let value = serde_json::to_value(record).map_err(ErrorDetail::EncodeRecord)?;
    cache.set(key, value).await.map_err(ErrorDetail::cache)
}
