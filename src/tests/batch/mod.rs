use serde_json::{Value, json};

use super::{FakeFetcher, node_id};
use crate::{
    cache::MemoryCache, config::Config, download::ExtractContext, download_media_files,
    local::LocalStore, node::MemoryNodeStore,
};

async fn load() -> (Config, Vec<Value>) {
    let config = tokio::fs::read_to_string("src/tests/batch/config.yaml")
        .await
        .unwrap();
    let config: Config = serde_yaml::from_str(&config).unwrap();
    config.validate().unwrap();
    let entities = tokio::fs::read_to_string("src/tests/batch/articles.json")
        .await
        .unwrap();
    (config, serde_json::from_str(&entities).unwrap())
}

fn sorted(mut urls: Vec<String>) -> Vec<String> {
    urls.sort();
    urls
}

const FETCHED: [&str; 6] = [
    "https://cdn.example.com/g1.png",
    "https://cms.example.com/uploads/first.jpg",
    "https://cms.example.com/uploads/g2.png",
    "https://cms.example.com/uploads/inline-1.png",
    "https://cms.example.com/uploads/portrait.webp",
    "https://cms.example.com/uploads/quote.png",
];

#[tokio::test]
async fn articles() {
    let (config, original) = load().await;
    let ctx = ExtractContext::from_config(
        &config,
        MemoryCache::default(),
        FakeFetcher::default(),
        MemoryNodeStore::default(),
    );
    let mut entities = original.clone();
    let report = download_media_files(&mut entities, "article", &ctx).await;

    assert!(report.is_success());
    assert_eq!(report.entities, 3);
    assert_eq!(sorted(ctx.fetcher.urls()), FETCHED);
    assert!(
        ctx.fetcher
            .auths()
            .iter()
            .all(|auth| auth.as_deref() == Some("test-token"))
    );

    assert_eq!(
        entities[0]["cover"]["localFile___NODE"],
        json!(node_id("https://cms.example.com/uploads/first.jpg"))
    );
    assert_eq!(entities[0]["content"], json!("Hello ![inline](inline-1.png)"));
    assert_eq!(entities[1]["cover"], Value::Null);
    assert!(entities[1].get("content_images___NODE").is_none());
    assert_eq!(
        entities[1]["gallery"][0]["localFile___NODE"],
        json!(node_id("https://cdn.example.com/g1.png"))
    );
    let block = &entities[2]["blocks"][0];
    assert_eq!(block["content"], json!("> ![q](quote.png)"));
    assert_eq!(
        block["content_images___NODE"],
        json!([node_id("https://cms.example.com/uploads/quote.png")])
    );
    assert_eq!(
        block["portrait"]["localFile___NODE"],
        json!(node_id("https://cms.example.com/uploads/portrait.webp"))
    );
    assert_eq!(ctx.cache.len().await, 6);

    // A rebuild starts again from the entities as served by the api.
    let mut rebuilt = original.clone();
    let report = download_media_files(&mut rebuilt, "article", &ctx).await;
    assert!(report.is_success());
    assert_eq!(rebuilt, entities);
    assert_eq!(ctx.fetcher.urls().len(), FETCHED.len());
    assert_eq!(ctx.nodes.touched().await.len(), FETCHED.len());
}

#[tokio::test]
async fn sequential_fan_out_processes_everything() {
    let (config, mut entities) = load().await;
    let ctx = ExtractContext::from_config(
        &config,
        MemoryCache::default(),
        FakeFetcher::failing(["https://cms.example.com/uploads/first.jpg"]),
        MemoryNodeStore::default(),
    )
    .concurrency(1);
    let report = download_media_files(&mut entities, "article", &ctx).await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 0);
    assert_eq!(report.failures[0].1.context.pointer, "/cover");
    assert_eq!(
        report.failures[0].1.to_string(),
        "article[0]/cover: Failed to fetch remote media: remote object responded with 404 Not Found (https://cms.example.com/uploads/first.jpg)"
    );
    assert_eq!(ctx.fetcher.urls().len(), FETCHED.len());
    assert_eq!(entities[0]["content"], json!("Hello ![inline](inline-1.png)"));
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn sqlite_store_survives_between_runs() {
    let (config, entities) = load().await;
    let store = LocalStore::open("sqlite::memory:").await.unwrap();

    let ctx = ExtractContext::from_config(
        &config,
        store.cache(),
        FakeFetcher::default(),
        store.nodes(),
    );
    let mut first = entities.clone();
    download_media_files(&mut first, "article", &ctx)
        .await
        .into_result()
        .unwrap();
    assert_eq!(ctx.fetcher.urls().len(), FETCHED.len());

    let ctx = ExtractContext::from_config(
        &config,
        store.cache(),
        FakeFetcher::default(),
        store.nodes(),
    );
    let mut second = entities.clone();
    download_media_files(&mut second, "article", &ctx)
        .await
        .into_result()
        .unwrap();
    assert!(ctx.fetcher.urls().is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn corrupt_sqlite_record_is_refetched() {
    let (config, entities) = load().await;
    let store = LocalStore::open("sqlite::memory:").await.unwrap();
    sqlx::query("INSERT INTO media_cache(key, value) VALUES (?, ?)")
        .bind("strapi-media-11")
        .bind("not json")
        .execute(store.pool())
        .await
        .unwrap();

    let ctx = ExtractContext::from_config(
        &config,
        store.cache(),
        FakeFetcher::default(),
        store.nodes(),
    );
    let mut entities = entities;
    let report = download_media_files(&mut entities, "article", &ctx).await;
    assert!(report.is_success());
    assert!(
        ctx.fetcher
            .urls()
            .contains(&"https://cms.example.com/uploads/first.jpg".to_owned())
    );
    assert_eq!(
        entities[0]["cover"]["localFile___NODE"],
        json!(node_id("https://cms.example.com/uploads/first.jpg"))
    );
}
