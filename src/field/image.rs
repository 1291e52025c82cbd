use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{ImageField, LOCAL_FILE_KEY};
use crate::{
    Error, ErrorContext, ErrorDetail,
    cache::{self, ImageRecord, MediaCache},
    config::OnFailure,
    download::ExtractContext,
    fetch::{self, FetchRequest, RemoteFetcher},
    node::NodeStore,
};

pub(super) async fn resolve_image<C, F, N>(
    image: &mut Map<String, Value>,
    ctx: &ExtractContext<C, F, N>,
    trail: &ErrorContext,
) -> Result<(), Error>
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    let Some(field) = ImageField::from_map(image) else {
        return Ok(());
    };
    match cached_or_fetch(&field, ctx).await {
        Ok(file_node_id) => {
            image.insert(LOCAL_FILE_KEY.to_owned(), Value::String(file_node_id));
            Ok(())
        }
        Err(detail) => match ctx.policy.image {
            OnFailure::Skip => {
                warn!(field = %trail, url = %field.url, error = %detail, "Skipping image field");
                Ok(())
            }
            OnFailure::Propagate => Err(trail.error(detail)),
        },
    }
}

async fn cached_or_fetch<C, F, N>(
    field: &ImageField,
    ctx: &ExtractContext<C, F, N>,
) -> Result<String, ErrorDetail>
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    let key = field.id.as_deref().map(cache::image_key);

    if let Some(key) = &key {
        let record = cache::get_record::<_, ImageRecord>(&ctx.cache, key).await?;
        if let Some(record) = record.filter(|record| record.updated_at == field.updated_at) {
            let node = ctx
                .nodes
                .get_node(&record.file_node_id)
                .await
                .map_err(ErrorDetail::node_store)?;
            match node {
                Some(node) => {
                    ctx.nodes
                        .touch_node(&node.id)
                        .await
                        .map_err(ErrorDetail::node_store)?;
                    debug!(%key, node = %node.id, "Reusing cached media");
                    return Ok(node.id);
                }
                None => debug!(%key, node = %record.file_node_id, "Cached node is gone, fetching again"),
            }
        }
    } else {
        debug!(url = %field.url, "Image field has no id, bypassing cache");
    }

    let url = fetch::resolve_source_url(&field.url, &ctx.api_url);
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

    if let Some(key) = &key {
        cache::set_record(
            &ctx.cache,
            key,
            &ImageRecord {
                file_node_id: node.id.clone(),
                updated_at: field.updated_at.clone(),
            },
        )
        .await?;
    }
    Ok(node.id)
}
