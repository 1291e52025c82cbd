use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{id_fragment, images_key};
use crate::{
    Error, ErrorContext, ErrorDetail,
    cache::{self, MarkdownImageRecord, MediaCache},
    config::OnFailure,
    download::ExtractContext,
    fetch::{self, FetchRequest, RemoteFetcher},
    node::NodeStore,
};

pub(super) mod parser;

/// Downloads every image referenced from `container[key]`, collects the file
/// node ids under the sibling images key and rewrites the image paths in the
/// text to the downloaded file names.
///
/// Replacement is by literal path, so every occurrence of a path in the text
/// is rewritten, not only the one inside the image node.
pub(super) async fn resolve_markdown_images<C, F, N>(
    container: &mut Map<String, Value>,
    key: &str,
    ctx: &ExtractContext<C, F, N>,
    trail: &ErrorContext,
) -> Result<(), Error>
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    let paths = match container.get(key) {
        Some(Value::String(text)) if !text.is_empty() => {
            parser::image_destinations(text).collect::<Vec<_>>()
        }
        _ => return Ok(()),
    };
    let owner = container.get("id").and_then(id_fragment);
    let list_key = images_key(key);

    for path in paths {
        if path.is_empty() {
            continue;
        }
        let record = match cached_or_fetch(owner.as_deref(), &path, ctx).await {
            Ok(record) => record,
            Err(detail) => match ctx.policy.markdown {
                OnFailure::Skip => {
                    warn!(field = %trail, %path, error = %detail, "Skipping markdown image");
                    continue;
                }
                OnFailure::Propagate => return Err(trail.error(detail)),
            },
        };

        let id = Value::String(record.file_node_id);
        match container.get_mut(&list_key) {
            Some(Value::Array(ids)) => ids.push(id),
            _ => {
                container.insert(list_key.clone(), Value::Array(vec![id]));
            }
        }
        if let Some(Value::String(text)) = container.get_mut(key) {
            *text = text.replace(&path, &record.file_node_base);
        }
    }
    Ok(())
}

async fn cached_or_fetch<C, F, N>(
    owner: Option<&str>,
    path: &str,
    ctx: &ExtractContext<C, F, N>,
) -> Result<MarkdownImageRecord, ErrorDetail>
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    let key = owner.map(|owner| cache::markdown_image_key(owner, path));

    if let Some(key) = &key {
        if let Some(record) = cache::get_record::<_, MarkdownImageRecord>(&ctx.cache, key).await? {
            ctx.nodes
                .touch_node(&record.file_node_id)
                .await
                .map_err(ErrorDetail::node_store)?;
            debug!(%key, node = %record.file_node_id, "Reusing cached markdown image");
            return Ok(record);
        }
    }

    let url = fetch::resolve_source_url(path, &ctx.api_url);
    let node = ctx
        .fetcher
        .fetch(
            FetchRequest {
                url: &url,
                auth: ctx.auth.as_deref(),
            },
            &ctx.nodes,
        )
        .await
        .map_err(ErrorDetail::Fetch)?;
    let record = MarkdownImageRecord {
        file_node_id: node.id,
        file_node_base: node.base,
    };
    if let Some(key) = &key {
        cache::set_record(&ctx.cache, key, &record).await?;
    }
    Ok(record)
}
