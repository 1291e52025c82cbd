use std::path::PathBuf;

use crate::node::{FileNode, NodeStore};

mod http;

pub use http::HttpFetcher;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid media url ({url}): {error}")]
    InvalidUrl {
        url: String,
        error: url::ParseError,
    },
    #[error("failed to fetch remote object ({url}): {error}")]
    Transport { url: String, error: reqwest::Error },
    #[error("remote object responded with {status} ({url})")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to write downloaded file ({path:?}): {error}")]
    Write {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("failed to register file node: {0}")]
    CreateNode(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    /// Bearer credential forwarded unchanged to the remote.
    pub auth: Option<&'a str>,
}

/// Downloads a remote file, places it locally and registers it as a node.
pub trait RemoteFetcher {
    fn fetch<N: NodeStore + Sync>(
        &self,
        request: FetchRequest<'_>,
        nodes: &N,
    ) -> impl Future<Output = Result<FileNode, Error>> + Send;
}

/// Media paths beginning with `http` are used verbatim, everything else is
/// appended to the api url.
pub fn resolve_source_url(path: &str, api_url: &str) -> String {
    if path.starts_with("http") {
        path.to_owned()
    } else {
        format!("{api_url}{path}")
    }
}
