use anyhow::Result;
use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use crate::common::auth::as_writer;
use crate::common::payloads;
use crate::common::server_utils::create_test_server;
use crate::common::test_utils;

async fn create_news(server: &TestServer, title: &str, category: &str, writer: &str) -> i32 {
    let response = as_writer(server.post("/api/v1/news"), writer)
        .json(&payloads::news_in(title, category))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap() as i32
}

fn ids(page: &Value) -> Vec<i64> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

/// Follows `nextCursor` from the first page until `hasMore` is false.
async fn walk(server: &TestServer, limit: u32) -> Vec<Value> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut request = server.get("/api/v1/news").add_query_param("limit", limit);
        if let Some(cursor) = &cursor {
            request = request.add_query_param("cursor", cursor);
        }
        let response = request.await;
        response.assert_status_ok();

        let page: Value = response.json();
        let has_more = page["hasMore"].as_bool().unwrap();
        cursor = page["nextCursor"].as_str().map(str::to_string);
        pages.push(page);
        if !has_more {
            return pages;
        }
    }
}

#[tokio::test]
async fn test_cursor_walk_over_twenty_five_items() -> Result<()> {
    let (server, _db) = create_test_server();
    for i in 0..25 {
        create_news(&server, &format!("Story {i}"), "movies", "writer-1").await;
    }

    let pages = walk(&server, 10).await;
    let sizes: Vec<usize> = pages.iter().map(|p| ids(p).len()).collect();
    let more: Vec<bool> = pages.iter().map(|p| p["hasMore"].as_bool().unwrap()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(more, vec![true, true, false]);
    let prev: Vec<bool> = pages.iter().map(|p| p["hasPrev"].as_bool().unwrap()).collect();
    assert_eq!(prev, vec![false, true, true]);
    assert!(pages.iter().all(|p| p["totalItems"] == 25));

    let walked: Vec<i64> = pages.iter().flat_map(ids).collect();
    let single = server
        .get("/api/v1/news")
        .add_query_param("page", 1)
        .add_query_param("limit", 100)
        .await
        .json::<Value>();
    assert_eq!(walked, ids(&single));
    assert_eq!(single["totalItems"], 25);
    Ok(())
}

#[tokio::test]
async fn test_shared_timestamps_are_walked_by_descending_id() -> Result<()> {
    let (server, db) = create_test_server();
    let instant = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();

    let mut created = Vec::new();
    for i in 0..7 {
        let id = create_news(&server, &format!("Tied {i}"), "movies", "writer-1").await;
        created.push(i64::from(id));
        let mut conn = db.lock().unwrap();
        test_utils::update_content_item_timestamp(&mut conn, id, instant);
    }

    let walked: Vec<i64> = walk(&server, 3).await.iter().flat_map(ids).collect();
    created.reverse();
    assert_eq!(walked, created);
    Ok(())
}

#[tokio::test]
async fn test_newer_insert_does_not_shift_next_page() -> Result<()> {
    let (server, _db) = create_test_server();
    for i in 0..6 {
        create_news(&server, &format!("Early {i}"), "movies", "writer-1").await;
    }

    let first: Value = server
        .get("/api/v1/news")
        .add_query_param("limit", 2)
        .await
        .json();
    let cursor = first["nextCursor"].as_str().unwrap().to_string();

    let next = |cursor: String| {
        server
            .get("/api/v1/news")
            .add_query_param("limit", 2)
            .add_query_param("cursor", cursor)
    };

    let before: Value = next(cursor.clone()).await.json();
    create_news(&server, "Late arrival", "movies", "writer-1").await;
    let after: Value = next(cursor).await.json();

    assert_eq!(ids(&before), ids(&after));
    Ok(())
}

#[tokio::test]
async fn test_prev_direction_returns_preceding_page() -> Result<()> {
    let (server, _db) = create_test_server();
    for i in 0..9 {
        create_news(&server, &format!("Item {i}"), "movies", "writer-1").await;
    }

    let pages = walk(&server, 3).await;
    let back: Value = server
        .get("/api/v1/news")
        .add_query_param("limit", 3)
        .add_query_param("direction", "prev")
        .add_query_param("cursor", pages[2]["prevCursor"].as_str().unwrap())
        .await
        .json();

    assert_eq!(ids(&back), ids(&pages[1]));
    assert_eq!(back["hasMore"], true);
    assert_eq!(back["hasPrev"], true);
    assert_eq!(back["totalItems"], 9);
    Ok(())
}

#[tokio::test]
async fn test_offset_mode_totals_and_beyond_last_page() -> Result<()> {
    let (server, _db) = create_test_server();
    for i in 0..5 {
        create_news(&server, &format!("Paged {i}"), "movies", "writer-1").await;
    }

    let page: Value = server
        .get("/api/v1/news")
        .add_query_param("page", 2)
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(page["currentPage"], 2);
    assert_eq!(page["totalPages"], 3);
    assert_eq!(page["totalItems"], 5);
    assert_eq!(page["hasNextPage"], true);
    assert_eq!(page["hasPrevPage"], true);
    assert_eq!(ids(&page).len(), 2);

    let beyond: Value = server
        .get("/api/v1/news")
        .add_query_param("page", 9)
        .add_query_param("limit", 2)
        .await
        .json();
    assert!(ids(&beyond).is_empty());
    assert_eq!(beyond["hasNextPage"], false);
    Ok(())
}

#[tokio::test]
async fn test_rejects_malformed_paging_parameters() -> Result<()> {
    let (server, _db) = create_test_server();
    create_news(&server, "Only one", "movies", "writer-1").await;

    let cases: Vec<Vec<(&str, &str)>> = vec![
        vec![("cursor", "yesterday_4")],
        vec![("cursor", "2024-05-01T10:00:00.000000Z_x")],
        vec![("limit", "0")],
        vec![("limit", "101")],
        vec![("limit", "-1")],
        vec![("limit", "abc")],
        vec![("page", "first")],
        vec![("page", "0")],
        vec![("page", "1"), ("cursor", "2024-05-01T10:00:00.000000Z_4")],
        vec![("direction", "prev")],
        vec![("sort", "sideways")],
        vec![("time", "fortnight")],
    ];

    for params in cases {
        let mut request = server.get("/api/v1/news");
        for (key, value) in &params {
            request = request.add_query_param(key, value);
        }
        let response = request.await;
        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {params:?}"
        );
        assert!(response.json::<Value>()["error"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn test_category_writer_and_search_filters() -> Result<()> {
    let (server, _db) = create_test_server();
    create_news(&server, "Pushpa 2 Review", "movies", "writer-1").await;
    create_news(&server, "Election Results", "politics", "writer-2").await;
    create_news(&server, "Assembly Session", "politics", "writer-1").await;

    let count = |params: Vec<(&'static str, &'static str)>| {
        let mut request = server.get("/api/v1/news").add_query_param("page", 1);
        for (key, value) in params {
            request = request.add_query_param(key, value);
        }
        async move { request.await.json::<Value>()["totalItems"].as_u64().unwrap() }
    };

    assert_eq!(count(vec![("category", "politics")]).await, 2);
    assert_eq!(count(vec![("category", "రాజకీయాలు")]).await, 0);
    assert_eq!(count(vec![("writer", "writer-1")]).await, 2);
    assert_eq!(
        count(vec![("category", "politics"), ("writer", "writer-1")]).await,
        1
    );
    assert_eq!(count(vec![("searchText", "PUSHPA")]).await, 1);
    assert_eq!(count(vec![("searchText", "tollywood")]).await, 3);
    assert_eq!(count(vec![("searchText", "100%")]).await, 0);
    Ok(())
}

#[tokio::test]
async fn test_search_matches_tag_values_not_their_encoding() -> Result<()> {
    let (server, _db) = create_test_server();
    for title in ["Pushpa 2 Review", "Election Results", "Assembly Session"] {
        create_news(&server, title, "movies", "writer-1").await;
    }

    let count = |text: &'static str| {
        let request = server
            .get("/api/v1/news")
            .add_query_param("page", 1)
            .add_query_param("searchText", text);
        async move { request.await.json::<Value>()["totalItems"].as_u64().unwrap() }
    };

    for text in ["[", "]", "\"", "\",\"", ","] {
        assert_eq!(count(text).await, 0, "searchText {text:?} matched");
    }
    assert_eq!(count("box").await, 3);
    assert_eq!(count("OFFICE").await, 3);
    Ok(())
}

#[tokio::test]
async fn test_latest_and_category_listings() -> Result<()> {
    let (server, _db) = create_test_server();
    create_news(&server, "Pushpa 2 Review", "movies", "writer-1").await;
    create_news(&server, "Election Results", "politics", "writer-2").await;
    let newest = create_news(&server, "Assembly Session", "politics", "writer-1").await;

    let latest: Value = server
        .get("/api/v1/news/latest")
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(ids(&latest).len(), 2);
    assert_eq!(ids(&latest)[0], i64::from(newest));
    assert_eq!(latest["hasMore"], true);

    let politics: Value = server
        .get("/api/v1/news/category/politics")
        .add_query_param("page", 1)
        .await
        .json();
    assert_eq!(politics["totalItems"], 2);

    // the path category wins over a query category
    let overridden: Value = server
        .get("/api/v1/news/category/movies")
        .add_query_param("category", "politics")
        .add_query_param("page", 1)
        .await
        .json();
    assert_eq!(overridden["totalItems"], 1);

    let unknown = server.get("/api/v1/podcasts/latest").await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_time_windows() -> Result<()> {
    let (server, db) = create_test_server();
    create_news(&server, "Fresh", "movies", "writer-1").await;
    let old = create_news(&server, "Archive", "movies", "writer-1").await;
    {
        let mut conn = db.lock().unwrap();
        let long_ago = Utc::now().naive_utc() - Duration::days(800);
        test_utils::update_content_item_timestamp(&mut conn, old, long_ago);
    }

    let titles = |time: &'static str| {
        let request = server
            .get("/api/v1/news")
            .add_query_param("time", time)
            .add_query_param("page", 1);
        async move {
            request.await.json::<Value>()["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item["title"]["en"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(titles("24h").await, vec!["Fresh"]);
    assert_eq!(titles("2years").await, vec!["Fresh"]);
    assert_eq!(titles("3years").await, vec!["Fresh", "Archive"]);
    assert_eq!(titles("above1year").await, vec!["Archive"]);
    assert_eq!(titles("last24h").await, vec!["Fresh"]);
    Ok(())
}
