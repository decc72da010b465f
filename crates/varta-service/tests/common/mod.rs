#![allow(dead_code)]

use diesel::{Connection, sqlite::SqliteConnection};
use diesel_migrations::MigrationHarness;
use varta_service::MIGRATIONS;

pub fn establish_test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("Failed to create in-memory database");

    connection
        .run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    connection
}

pub mod server_utils {
    use super::*;
    use axum_test::TestServer;
    use std::sync::{Arc, Mutex};
    use varta_service::{DefaultAppState, config::ServiceConfig, create_app};

    pub fn create_test_server() -> (TestServer, Arc<Mutex<SqliteConnection>>) {
        create_test_server_with(ServiceConfig::default())
    }

    pub fn create_test_server_with(
        config: ServiceConfig,
    ) -> (TestServer, Arc<Mutex<SqliteConnection>>) {
        let connection = establish_test_connection();
        let db = Arc::new(Mutex::new(connection));

        let state = DefaultAppState::new(db.clone(), config);
        let app = create_app(state);

        let server = TestServer::new(app).unwrap();
        (server, db)
    }
}

pub mod auth {
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::TestRequest;

    pub fn as_caller(request: TestRequest, id: &str, role: &str) -> TestRequest {
        request
            .add_header(
                HeaderName::from_static("x-author-id"),
                HeaderValue::from_str(id).unwrap(),
            )
            .add_header(
                HeaderName::from_static("x-author-role"),
                HeaderValue::from_str(role).unwrap(),
            )
    }

    pub fn as_writer(request: TestRequest, id: &str) -> TestRequest {
        as_caller(request, id, "writer")
    }

    pub fn as_admin(request: TestRequest) -> TestRequest {
        as_caller(request, "admin-1", "admin")
    }
}

pub mod payloads {
    use serde_json::{Value, json};

    pub fn news(title_en: &str) -> Value {
        json!({
            "title": { "en": title_en, "te": "వార్త" },
            "description": { "en": "Body", "te": "వివరణ" },
            "category": { "en": "movies", "te": "సినిమాలు" },
            "tags": ["tollywood", " ", "box-office"],
            "mainUrl": "https://cdn.example.com/poster.jpg",
            "details": { "movieRating": 3.5 }
        })
    }

    pub fn news_in(title_en: &str, category: &str) -> Value {
        let mut payload = news(title_en);
        payload["category"]["en"] = json!(category);
        payload
    }

    pub fn gallery(title_en: &str) -> Value {
        json!({
            "title": { "en": title_en, "te": "గ్యాలరీ" },
            "category": { "en": "events", "te": "ఈవెంట్స్" },
            "details": {
                "name": { "en": "Premiere", "te": "ప్రీమియర్" },
                "pictures": ["https://cdn.example.com/1.jpg"]
            }
        })
    }

    pub fn video(title_en: &str, youtube_id: &str) -> Value {
        json!({
            "title": { "en": title_en, "te": "వీడియో" },
            "details": { "youtubeId": youtube_id }
        })
    }
}

pub mod test_utils {
    use chrono::NaiveDateTime;
    use diesel::prelude::*;
    use diesel::sqlite::SqliteConnection;
    use varta_service::schema::{comment_reactions, comments, content_items};

    pub fn count_content_items(conn: &mut SqliteConnection, kind: &str) -> i64 {
        content_items::table
            .filter(content_items::kind.eq(kind))
            .count()
            .get_result(conn)
            .expect("Failed to count content items")
    }

    pub fn count_comments(conn: &mut SqliteConnection) -> i64 {
        comments::table
            .count()
            .get_result(conn)
            .expect("Failed to count comments")
    }

    pub fn count_comment_reactions(conn: &mut SqliteConnection) -> i64 {
        comment_reactions::table
            .count()
            .get_result(conn)
            .expect("Failed to count comment reactions")
    }

    pub fn update_content_item_timestamp(
        conn: &mut SqliteConnection,
        id: i32,
        created_at: NaiveDateTime,
    ) {
        diesel::update(content_items::table.find(id))
            .set(content_items::created_at.eq(created_at))
            .execute(conn)
            .expect("Failed to update content item timestamp");
    }
}
