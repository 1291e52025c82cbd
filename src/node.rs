//! Host node store
//!
//! Downloaded files are owned by the host as nodes. This crate only refers to
//! them by id, creates them through the fetcher and touches them when a cached
//! reference is reused so the host does not collect them as orphans.

use std::{convert::Infallible, path::PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub id: String,
    /// Display-safe file name, e.g. `cover.png`.
    pub base: String,
    pub path: PathBuf,
}

pub trait NodeStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn create_node(&self, node: FileNode) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn get_node(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<FileNode>, Self::Error>> + Send;

    fn touch_node(&self, id: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Default)]
pub struct MemoryNodeStore {
    nodes: tokio::sync::Mutex<IndexMap<String, FileNode>>,
    touched: tokio::sync::Mutex<Vec<String>>,
}

impl MemoryNodeStore {
    /// Ids passed to `touch_node`, in call order.
    pub async fn touched(&self) -> Vec<String> {
        self.touched.lock().await.clone()
    }

    pub async fn nodes(&self) -> Vec<FileNode> {
        self.nodes.lock().await.values().cloned().collect()
    }

    pub async fn remove(&self, id: &str) -> Option<FileNode> {
        self.nodes.lock().await.shift_remove(id)
    }
}

impl NodeStore for MemoryNodeStore {
    type Error = Infallible;

    async fn create_node(&self, node: FileNode) -> Result<(), Self::Error> {
        self.nodes.lock().await.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<FileNode>, Self::Error> {
        Ok(self.nodes.lock().await.get(id).cloned())
    }

    async fn touch_node(&self, id: &str) -> Result<(), Self::Error> {
        self.touched.lock().await.push(id.to_owned());
        Ok(())
    }
}
