use serde_json::json;

use super::{FakeFetcher, context, node_id};
use crate::{
    ErrorDetail,
    cache::MediaCache,
    config::{FailurePolicy, OnFailure},
    download_media_files, is_dynamic_zone,
};

const A: &str = "https://cms.example.com/uploads/a.png";
const B: &str = "https://cdn.example.com/b.jpg";

#[tokio::test]
async fn downloads_and_rewrites_each_image() {
    let ctx = context(FakeFetcher::default());
    let mut entities = [json!({
        "id": 7,
        "body": "Intro ![a](/uploads/a.png) and ![b](https://cdn.example.com/b.jpg)",
    })];
    let report = download_media_files(&mut entities, "article", &ctx).await;

    assert!(report.is_success());
    assert_eq!(ctx.fetcher.urls(), vec![A.to_owned(), B.to_owned()]);
    assert_eq!(
        entities[0],
        json!({
            "id": 7,
            "body": "Intro ![a](a.png) and ![b](b.jpg)",
            "body_images___NODE": [node_id(A), node_id(B)],
        })
    );
    assert_eq!(
        ctx.cache.get("strapi-media-7-/uploads/a.png").await.unwrap(),
        Some(json!({"fileNodeID": node_id(A), "fileNodeBase": "a.png"}))
    );
    assert_eq!(
        ctx.cache
            .get("strapi-media-7-https://cdn.example.com/b.jpg")
            .await
            .unwrap(),
        Some(json!({"fileNodeID": node_id(B), "fileNodeBase": "b.jpg"}))
    );
}

#[tokio::test]
async fn cached_paths_are_not_fetched() {
    let ctx = context(FakeFetcher::default());
    ctx.cache
        .set(
            "strapi-media-7-/uploads/a.png",
            json!({"fileNodeID": "cached-a", "fileNodeBase": "a-local.png"}),
        )
        .await
        .unwrap();
    let mut entities = [json!({
        "id": 7,
        "body": "![a](/uploads/a.png) ![b](https://cdn.example.com/b.jpg)",
    })];
    download_media_files(&mut entities, "article", &ctx)
        .await
        .into_result()
        .unwrap();

    assert_eq!(ctx.fetcher.urls(), vec![B.to_owned()]);
    assert_eq!(ctx.nodes.touched().await, vec!["cached-a".to_owned()]);
    assert_eq!(entities[0]["body"], json!("![a](a-local.png) ![b](b.jpg)"));
    assert_eq!(
        entities[0]["body_images___NODE"],
        json!(["cached-a", node_id(B)])
    );
}

#[tokio::test]
async fn failed_image_leaves_its_path_untouched() {
    let ctx = context(FakeFetcher::failing([A]));
    let mut entities = [json!({
        "id": 7,
        "body": "![a](/uploads/a.png) ![c](/uploads/c.png)",
    })];
    let report = download_media_files(&mut entities, "article", &ctx).await;

    let c = "https://cms.example.com/uploads/c.png";
    assert!(report.is_success());
    assert_eq!(ctx.fetcher.urls(), vec![A.to_owned(), c.to_owned()]);
    assert_eq!(entities[0]["body"], json!("![a](/uploads/a.png) ![c](c.png)"));
    assert_eq!(entities[0]["body_images___NODE"], json!([node_id(c)]));
    assert_eq!(
        ctx.cache.get("strapi-media-7-/uploads/a.png").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn propagate_policy_reports_markdown_failures() {
    let ctx = context(FakeFetcher::failing([A])).policy(FailurePolicy {
        image: OnFailure::Propagate,
        markdown: OnFailure::Propagate,
    });
    let mut entities = [json!({"id": 7, "body": "![a](/uploads/a.png)"})];
    let report = download_media_files(&mut entities, "article", &ctx).await;

    assert_eq!(report.failures.len(), 1);
    let (_, error) = &report.failures[0];
    assert_eq!(error.context.pointer, "/body");
    assert!(matches!(*error.detail, ErrorDetail::Fetch(_)));
    assert_eq!(entities[0], json!({"id": 7, "body": "![a](/uploads/a.png)"}));
}

#[tokio::test]
async fn ineligible_fields_are_untouched() {
    let ctx = context(FakeFetcher::default());
    let original = json!({
        "id": 7,
        "title": "![a](/uploads/a.png)",
        "body": "![b](/uploads/b.png)",
    });

    let mut entities = [original.clone()];
    download_media_files(&mut entities, "author", &ctx)
        .await
        .into_result()
        .unwrap();
    assert_eq!(entities[0], original);

    let mut entities = [original.clone()];
    download_media_files(&mut entities, "page", &ctx)
        .await
        .into_result()
        .unwrap();
    assert_eq!(entities[0], original);

    let mut entities = [original.clone()];
    download_media_files(&mut entities, "article", &ctx)
        .await
        .into_result()
        .unwrap();
    assert_eq!(entities[0]["title"], json!("![a](/uploads/a.png)"));
    assert!(entities[0].get("title_images___NODE").is_none());
    assert_eq!(entities[0]["body"], json!("![b](b.png)"));

    assert_eq!(
        ctx.fetcher.urls(),
        vec!["https://cms.example.com/uploads/b.png".to_owned()]
    );
}

#[tokio::test]
async fn repeated_path_is_rewritten_everywhere() {
    let ctx = context(FakeFetcher::default());
    let mut entities = [json!({
        "id": 7,
        "body": "![a](/uploads/a.png)\n\n[download](/uploads/a.png)",
    })];
    download_media_files(&mut entities, "article", &ctx)
        .await
        .into_result()
        .unwrap();

    assert_eq!(ctx.fetcher.urls(), vec![A.to_owned()]);
    assert_eq!(entities[0]["body"], json!("![a](a.png)\n\n[download](a.png)"));
    assert_eq!(entities[0]["body_images___NODE"], json!([node_id(A)]));
}

#[tokio::test]
async fn dynamic_zone_components_are_scanned() {
    let ctx = context(FakeFetcher::default());
    let mut entities = [json!({
        "id": 1,
        "sections": [
            {"id": 5, "strapi_component": "blocks.rich-text", "body": "![x](/uploads/x.png)"},
            {"id": 6, "strapi_component": "blocks.quote", "text": "plain"},
        ],
    })];
    assert!(is_dynamic_zone(&entities[0]["sections"]));

    download_media_files(&mut entities, "article", &ctx)
        .await
        .into_result()
        .unwrap();

    let x = "https://cms.example.com/uploads/x.png";
    assert_eq!(entities[0]["sections"][0]["body"], json!("![x](x.png)"));
    assert_eq!(
        entities[0]["sections"][0]["body_images___NODE"],
        json!([node_id(x)])
    );
    assert!(
        ctx.cache
            .get("strapi-media-5-/uploads/x.png")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn empty_or_imageless_markdown_adds_nothing() {
    let ctx = context(FakeFetcher::default());
    let mut entities = [
        json!({"id": 1, "body": ""}),
        json!({"id": 2, "body": "just [a link](/uploads/a.png)"}),
        json!({"id": 3, "body": null}),
    ];
    let expected = entities.clone();
    download_media_files(&mut entities, "article", &ctx)
        .await
        .into_result()
        .unwrap();

    assert_eq!(entities, expected);
    assert!(ctx.fetcher.urls().is_empty());
}
