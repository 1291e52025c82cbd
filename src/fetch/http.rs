use std::path::PathBuf;

use tracing::debug;

use super::{Error, FetchRequest, RemoteFetcher};
use crate::node::{FileNode, NodeStore};

pub struct HttpFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self::with_client(reqwest::Client::new(), download_dir)
    }

    pub fn with_client(client: reqwest::Client, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }
}

fn node_id(url: &str) -> String {
    blake3::hash(url.as_bytes()).to_hex().to_string()
}

fn base_name(url: &url::Url, id: &str, content_type: Option<&str>) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| urlencoding::decode(segment).ok())
        .filter(|name| {
            !name.is_empty() && *name != "." && *name != ".." && !name.contains(['/', '\\'])
        });
    if let Some(name) = segment {
        return name.into_owned();
    }
    let extension = content_type
        .and_then(|content_type| content_type.split(';').next())
        .and_then(|mime| mime_guess::get_mime_extensions_str(mime.trim()))
        .and_then(|extensions| extensions.first());
    match extension {
        Some(extension) => format!("{id}.{extension}"),
        None => id.to_owned(),
    }
}

impl RemoteFetcher for HttpFetcher {
    async fn fetch<N: NodeStore + Sync>(
        &self,
        request: FetchRequest<'_>,
        nodes: &N,
    ) -> Result<FileNode, Error> {
        let url = url::Url::parse(request.url).map_err(|error| Error::InvalidUrl {
            url: request.url.to_owned(),
            error,
        })?;
        let mut builder = self.client.get(url.clone());
        if let Some(token) = request.auth {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await.map_err(|error| Error::Transport {
            url: request.url.to_owned(),
            error,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: request.url.to_owned(),
                status,
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response.bytes().await.map_err(|error| Error::Transport {
            url: request.url.to_owned(),
            error,
        })?;

        let id = node_id(request.url);
        let base = base_name(&url, &id, content_type.as_deref());
        let dir = self.download_dir.join(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|error| Error::Write {
                path: dir.clone(),
                error,
            })?;
        let path = dir.join(&base);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|error| Error::Write {
                path: path.clone(),
                error,
            })?;
        debug!(url = %request.url, path = %path.display(), size = body.len(), "Downloaded media");

        let node = FileNode { id, base, path };
        nodes
            .create_node(node.clone())
            .await
            .map_err(|error| Error::CreateNode(Box::new(error)))?;
        Ok(node)
    }
}
