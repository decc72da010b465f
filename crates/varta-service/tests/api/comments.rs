use anyhow::Result;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use crate::common::auth::{as_admin, as_writer};
use crate::common::payloads;
use crate::common::server_utils::create_test_server;
use crate::common::test_utils;

/// Publishes a news item and returns its id and slug.
async fn publish(server: &TestServer, title: &str) -> (i64, String) {
    let item: Value = as_writer(server.post("/api/v1/news"), "writer-1")
        .json(&payloads::news(title))
        .await
        .json();
    (
        item["id"].as_i64().unwrap(),
        item["slug"].as_str().unwrap().to_string(),
    )
}

async fn comment(server: &TestServer, slug: &str, author: &str, body: &str, lang: &str) -> i64 {
    let response = as_writer(server.post(&format!("/api/v1/news/slug/{slug}/comments")), author)
        .json(&json!({ "body": body, "language": lang }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn reply(server: &TestServer, slug: &str, author: &str, parent_id: i64) -> Value {
    let response = as_writer(
        server.post(&format!("/api/v1/news/slug/{slug}/comments/replies")),
        author,
    )
    .json(&json!({ "parentId": parent_id, "body": "Agreed" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_comments_are_listed_per_language() -> Result<()> {
    let (server, _db) = create_test_server();
    let (id, slug) = publish(&server, "Hello World").await;
    let (_, other) = publish(&server, "Other Story").await;
    comment(&server, &slug, "reader-1", "Great read", "en").await;
    comment(&server, &slug, "reader-2", "చాలా బాగుంది", "te").await;
    comment(&server, &other, "reader-1", "Elsewhere", "en").await;

    let page: Value = server
        .get(&format!("/api/v1/news/slug/{slug}/comments"))
        .add_query_param("language", "en")
        .await
        .json();
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["body"], "Great read");
    assert_eq!(items[0]["contentId"], id);
    assert_eq!(items[0]["likes"], 0);
    assert_eq!(page["hasMore"], false);

    let missing = server.get(&format!("/api/v1/news/slug/{slug}/comments")).await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_comment_on_unknown_item_is_not_found() -> Result<()> {
    let (server, db) = create_test_server();
    publish(&server, "Hello World").await;

    let response = as_writer(server.post("/api/v1/news/slug/no-such-story/comments"), "reader-1")
        .json(&json!({ "body": "Hello?", "language": "en" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // slugs are per collection
    let response = as_writer(server.post("/api/v1/gallery/slug/hello-world/comments"), "reader-1")
        .json(&json!({ "body": "Hello?", "language": "en" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let listing = server
        .get("/api/v1/news/slug/no-such-story/comments")
        .add_query_param("language", "en")
        .await;
    assert_eq!(listing.status_code(), StatusCode::NOT_FOUND);

    let mut conn = db.lock().unwrap();
    assert_eq!(test_utils::count_comments(&mut conn), 0);
    Ok(())
}

#[tokio::test]
async fn test_deleted_item_takes_its_comments_along() -> Result<()> {
    let (server, db) = create_test_server();
    let (id, slug) = publish(&server, "Doomed").await;
    let root = comment(&server, &slug, "reader-1", "First!", "en").await;
    reply(&server, &slug, "reader-2", root).await;
    as_writer(server.post(&format!("/api/v1/comments/{root}/like")), "reader-3")
        .await
        .assert_status_ok();

    let response = as_writer(server.delete(&format!("/api/v1/news/{id}")), "writer-1").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    {
        let mut conn = db.lock().unwrap();
        assert_eq!(test_utils::count_comments(&mut conn), 0);
        assert_eq!(test_utils::count_comment_reactions(&mut conn), 0);
    }

    // a new item under the same slug starts with no comments
    let (_, reused) = publish(&server, "Doomed").await;
    assert_eq!(reused, slug);
    let page: Value = server
        .get(&format!("/api/v1/news/slug/{reused}/comments"))
        .add_query_param("language", "en")
        .await
        .json();
    assert!(page["items"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_comments_follow_item_through_rename() -> Result<()> {
    let (server, _db) = create_test_server();
    let (id, slug) = publish(&server, "Working Title").await;
    comment(&server, &slug, "reader-1", "Nice", "en").await;

    as_writer(server.put(&format!("/api/v1/news/{id}")), "writer-1")
        .json(&json!({ "title": { "en": "Final Title" } }))
        .await
        .assert_status_ok();

    let renamed: Value = server
        .get("/api/v1/news/slug/final-title/comments")
        .add_query_param("language", "en")
        .await
        .json();
    assert_eq!(renamed["items"].as_array().unwrap().len(), 1);

    // the abandoned slug no longer resolves
    let old = server
        .get("/api/v1/news/slug/working-title/comments")
        .add_query_param("language", "en")
        .await;
    assert_eq!(old.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_replies_inherit_language_and_attach_to_thread_root() -> Result<()> {
    let (server, _db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    let root = comment(&server, &slug, "reader-1", "మొదటి వ్యాఖ్య", "te").await;

    let first = reply(&server, &slug, "reader-2", root).await;
    assert_eq!(first["language"], "te");
    assert_eq!(first["parentId"], root);

    // replying to a reply still lands on the root
    let first_id = first["id"].as_i64().unwrap();
    let nested = reply(&server, &slug, "reader-3", first_id).await;
    assert_eq!(nested["parentId"], root);

    let top_level: Value = server
        .get(&format!("/api/v1/news/slug/{slug}/comments"))
        .add_query_param("language", "te")
        .await
        .json();
    assert_eq!(top_level["items"].as_array().unwrap().len(), 1);

    let replies: Value = server
        .get(&format!("/api/v1/news/slug/{slug}/comments"))
        .add_query_param("language", "te")
        .add_query_param("parent", root)
        .add_query_param("page", 1)
        .await
        .json();
    assert_eq!(replies["totalItems"], 2);
    Ok(())
}

#[tokio::test]
async fn test_reply_to_comment_on_other_item_is_rejected() -> Result<()> {
    let (server, _db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    let (_, other) = publish(&server, "Other Story").await;
    let root = comment(&server, &other, "reader-1", "Elsewhere", "en").await;

    let replies = format!("/api/v1/news/slug/{slug}/comments/replies");
    let response = as_writer(server.post(&replies), "reader-2")
        .json(&json!({ "parentId": root, "body": "Wrong thread" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = as_writer(server.post(&replies), "reader-2")
        .json(&json!({ "parentId": 9999, "body": "No parent" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_deleting_a_comment_removes_its_replies() -> Result<()> {
    let (server, db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    let root = comment(&server, &slug, "reader-1", "Root", "en").await;
    reply(&server, &slug, "reader-2", root).await;
    reply(&server, &slug, "reader-3", root).await;
    comment(&server, &slug, "reader-4", "Unrelated", "en").await;

    let response = as_writer(server.delete(&format!("/api/v1/comments/{root}")), "reader-2").await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = as_writer(server.delete(&format!("/api/v1/comments/{root}")), "reader-1").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["removed"], 3);

    let mut conn = db.lock().unwrap();
    assert_eq!(test_utils::count_comments(&mut conn), 1);
    Ok(())
}

#[tokio::test]
async fn test_admin_may_delete_any_comment() -> Result<()> {
    let (server, _db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    let id = comment(&server, &slug, "reader-1", "Spam", "en").await;

    let response = as_admin(server.delete(&format!("/api/v1/comments/{id}"))).await;
    response.assert_status_ok();

    let response = as_admin(server.delete(&format!("/api/v1/comments/{id}"))).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_like_and_dislike_toggle_per_caller() -> Result<()> {
    let (server, _db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    let id = comment(&server, &slug, "reader-1", "Hot take", "en").await;
    let like = format!("/api/v1/comments/{id}/like");
    let dislike = format!("/api/v1/comments/{id}/dislike");

    let summary: Value = as_writer(server.post(&like), "reader-2").await.json();
    assert_eq!(summary["likes"], 1);
    assert_eq!(summary["mine"], "like");

    let summary: Value = as_writer(server.post(&like), "reader-3").await.json();
    assert_eq!(summary["likes"], 2);

    // switching sides moves the vote
    let summary: Value = as_writer(server.post(&dislike), "reader-2").await.json();
    assert_eq!(summary["likes"], 1);
    assert_eq!(summary["dislikes"], 1);
    assert_eq!(summary["mine"], "dislike");

    // repeating withdraws it
    let summary: Value = as_writer(server.post(&dislike), "reader-2").await.json();
    assert_eq!(summary["dislikes"], 0);
    assert_eq!(summary["mine"], Value::Null);

    let page: Value = server
        .get(&format!("/api/v1/news/slug/{slug}/comments"))
        .add_query_param("language", "en")
        .await
        .json();
    assert_eq!(page["items"][0]["likes"], 1);
    assert_eq!(page["items"][0]["dislikes"], 0);

    let anonymous = server.post(&like).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let missing = as_writer(server.post("/api/v1/comments/9999/like"), "reader-2").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_comment_routes_accept_slugs_that_look_like_route_words() -> Result<()> {
    let (server, _db) = create_test_server();
    for title in ["Item", "Replies", "Comments"] {
        let (_, slug) = publish(&server, title).await;
        assert_eq!(slug, title.to_lowercase());

        let root = comment(&server, &slug, "reader-1", "Root", "en").await;
        let answer = reply(&server, &slug, "reader-2", root).await;
        assert_eq!(answer["parentId"], root);

        let page: Value = server
            .get(&format!("/api/v1/news/slug/{slug}/comments"))
            .add_query_param("language", "en")
            .await
            .json();
        assert_eq!(page["items"][0]["id"], root);
    }
    Ok(())
}

#[tokio::test]
async fn test_comment_listing_pages_with_cursor() -> Result<()> {
    let (server, _db) = create_test_server();
    let (_, slug) = publish(&server, "Hello World").await;
    for i in 0..5 {
        comment(&server, &slug, "reader-1", &format!("Comment {i}"), "en").await;
    }

    let path = format!("/api/v1/news/slug/{slug}/comments");
    let first: Value = server
        .get(&path)
        .add_query_param("language", "en")
        .add_query_param("limit", 3)
        .await
        .json();
    assert_eq!(first["items"].as_array().unwrap().len(), 3);
    assert_eq!(first["hasMore"], true);
    assert_eq!(first["items"][0]["body"], "Comment 4");

    let second: Value = server
        .get(&path)
        .add_query_param("language", "en")
        .add_query_param("limit", 3)
        .add_query_param("cursor", first["nextCursor"].as_str().unwrap())
        .await
        .json();
    let bodies: Vec<&str> = second["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["Comment 1", "Comment 0"]);
    assert_eq!(second["hasMore"], false);
    assert_eq!(second["hasPrev"], true);
    assert_eq!(second["totalItems"], 5);

    let bad_limit = server
        .get(&path)
        .add_query_param("language", "en")
        .add_query_param("limit", "abc")
        .await;
    assert_eq!(bad_limit.status_code(), StatusCode::BAD_REQUEST);
    assert!(bad_limit.json::<Value>()["error"].is_string());
    Ok(())
}
