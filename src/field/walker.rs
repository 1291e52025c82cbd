use futures::future::{FutureExt as _, LocalBoxFuture};
use serde_json::Value;

use super::{FieldKind, FieldScan, image, is_markdown, markdown};
use crate::{
    Error, ErrorContext, cache::MediaCache, download::ExtractContext, fetch::RemoteFetcher,
    node::NodeStore,
};

/// Walks `value` in place, resolving image fields and markdown images.
///
/// An error in one field does not stop its siblings from being processed;
/// the first error met in the subtree is returned once the walk completes.
pub fn traverse<'a, C, F, N>(
    value: &'a mut Value,
    ctx: &'a ExtractContext<C, F, N>,
    scan: &'a FieldScan,
    trail: ErrorContext,
) -> LocalBoxFuture<'a, Result<(), Error>>
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    async move {
        let mut first_error = None;
        match FieldKind::classify(value) {
            FieldKind::Image(map) => return image::resolve_image(map, ctx, &trail).await,
            FieldKind::Sequence(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    if let Err(error) = traverse(item, ctx, scan, trail.child(index)).await {
                        first_error.get_or_insert(error);
                    }
                }
            }
            FieldKind::Container(map) => {
                let keys = map.keys().cloned().collect::<Vec<_>>();
                for key in keys {
                    let field_trail = trail.child(&key);
                    if map
                        .get(&key)
                        .is_some_and(|field| is_markdown(&key, field, scan))
                    {
                        if let Err(error) =
                            markdown::resolve_markdown_images(map, &key, ctx, &field_trail).await
                        {
                            first_error.get_or_insert(error);
                        }
                    }
                    if let Some(field) = map.get_mut(&key) {
                        if let Err(error) = traverse(field, ctx, scan, field_trail).await {
                            first_error.get_or_insert(error);
                        }
                    }
                }
            }
            FieldKind::Scalar => {}
        }
        first_error.map_or(Ok(()), Err)
    }
    .boxed_local()
}
