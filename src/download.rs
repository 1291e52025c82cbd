//! Batch entry point
//!
//! Every entity is walked independently. Walks run concurrently up to the
//! configured bound and none of them is cancelled when another fails.

use futures::StreamExt as _;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    Error, ErrorContext,
    cache::MediaCache,
    config::{self, Config, EntityType, FailurePolicy, MarkdownImages},
    fetch::RemoteFetcher,
    field::{FieldScan, walker},
    node::NodeStore,
};

/// Everything a walk needs from its caller.
pub struct ExtractContext<C, F, N> {
    pub api_url: String,
    pub auth: Option<String>,
    pub cache: C,
    pub fetcher: F,
    pub nodes: N,
    pub markdown_images: MarkdownImages,
    pub types: Vec<EntityType>,
    pub policy: FailurePolicy,
    pub concurrency: usize,
}

impl<C, F, N> ExtractContext<C, F, N> {
    pub fn new(api_url: impl Into<String>, cache: C, fetcher: F, nodes: N) -> Self {
        Self {
            api_url: api_url.into(),
            auth: None,
            cache,
            fetcher,
            nodes,
            markdown_images: MarkdownImages::default(),
            types: Vec::new(),
            policy: FailurePolicy::default(),
            concurrency: num_cpus::get(),
        }
    }

    pub fn from_config(config: &Config, cache: C, fetcher: F, nodes: N) -> Self {
        Self {
            api_url: config.api_url.clone(),
            auth: config.jwt_token.clone(),
            cache,
            fetcher,
            nodes,
            markdown_images: config.markdown_images.clone(),
            types: config.types.clone(),
            policy: config.on_failure,
            concurrency: config.concurrency(),
        }
    }

    pub fn auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(token.into());
        self
    }

    pub fn markdown_images(mut self, types: Vec<EntityType>, markdown_images: MarkdownImages) -> Self {
        self.types = types;
        self.markdown_images = markdown_images;
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn field_scan(&self, entity_type: &str) -> FieldScan {
        config::resolve_field_scan(&self.types, &self.markdown_images, entity_type)
    }
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub entities: usize,
    /// Failed entities by index, in ascending order.
    pub failures: Vec<(usize, Error)>,
}

impl DownloadReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, for callers that treat the batch as all or nothing.
    pub fn into_result(self) -> Result<(), Error> {
        match self.failures.into_iter().next() {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}

/// Downloads the media referenced by `entities` of type `entity_type`,
/// mutating them in place.
pub async fn download_media_files<C, F, N>(
    entities: &mut [Value],
    entity_type: &str,
    ctx: &ExtractContext<C, F, N>,
) -> DownloadReport
where
    C: MediaCache + Sync,
    F: RemoteFetcher + Sync,
    N: NodeStore + Sync,
{
    let scan = ctx.field_scan(entity_type);
    let scan = &scan;
    let total = entities.len();
    debug!(%entity_type, entities = total, concurrency = ctx.concurrency, "Downloading media");

    let mut failures = futures::stream::iter(entities.iter_mut().enumerate())
        .map(|(index, entity)| async move {
            let trail = ErrorContext::new(entity_type, index);
            (index, walker::traverse(entity, ctx, scan, trail).await)
        })
        .buffer_unordered(ctx.concurrency.max(1))
        .filter_map(|(index, result)| async move {
            result.err().map(|error| {
                warn!(%error, "Entity failed");
                (index, error)
            })
        })
        .collect::<Vec<_>>()
        .await;
    failures.sort_by_key(|(index, _)| *index);

    info!(
        %entity_type,
        entities = total,
        failed = failures.len(),
        "Media download finished"
    );
    DownloadReport {
        entities: total,
        failures,
    }
}
