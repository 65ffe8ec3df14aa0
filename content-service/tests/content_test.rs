//! Posts, categories, tags and subscribers against PostgreSQL.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -p content-service --test content_test -- --ignored

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use serial_test::serial;

async fn create_post(app: &TestApp, title: &str) -> serde_json::Value {
    let (status, body) = app
        .request(
            "POST",
            "/api/admin/posts",
            Some(json!({
                "title": title,
                "content": "## Payroll basics\n\nRun payroll on time and keep your records straight.",
                "focus_keyword": "payroll",
                "tags": ["Payroll", "Small Business"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn new_posts_are_drafts_with_derived_fields() {
    let app = TestApp::spawn().await;

    let post = create_post(&app, "Payroll Basics for 2025").await;

    assert_eq!(post["status"], "draft");
    assert_eq!(post["slug"], "payroll-basics-for-2025");
    assert!(post["published_at"].is_null());
    assert!(post["reading_time_minutes"].as_i64().unwrap() >= 1);
    assert!(post["quality_score"].as_i64().is_some());

    let tags: Vec<&str> = post["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["slug"].as_str().unwrap())
        .collect();
    assert_eq!(tags.len(), 2);
    assert!(tags.contains(&"payroll"));
    assert!(tags.contains(&"small-business"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn duplicate_slug_is_a_conflict() {
    let app = TestApp::spawn().await;
    create_post(&app, "Same Title").await;

    let (status, _) = app
        .request(
            "POST",
            "/api/admin/posts",
            Some(json!({ "title": "Same Title", "content": "Other body" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn publish_lifecycle_keeps_published_at_in_step() {
    let app = TestApp::spawn().await;
    let post = create_post(&app, "Quarterly Estimates").await;
    let id = post["id"].as_str().unwrap();
    let slug = post["slug"].as_str().unwrap();

    // drafts are invisible to readers
    let (status, _) = app.public_request("GET", &format!("/api/posts/{slug}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, published) = app
        .request("POST", &format!("/api/admin/posts/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    let first_stamp = published["published_at"].clone();
    assert!(!first_stamp.is_null());

    // publishing again keeps the original timestamp
    let (_, again) = app
        .request("POST", &format!("/api/admin/posts/{id}/publish"), None)
        .await;
    assert_eq!(again["published_at"], first_stamp);

    let (status, public) = app.public_request("GET", &format!("/api/posts/{slug}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["title"], "Quarterly Estimates");

    let (_, listing) = app.public_request("GET", "/api/posts", None).await;
    assert_eq!(listing["total"], 1);

    let (_, archived) = app
        .request("POST", &format!("/api/admin/posts/{id}/archive"), None)
        .await;
    assert_eq!(archived["status"], "archived");
    assert!(archived["published_at"].is_null());

    let (_, listing) = app.public_request("GET", "/api/posts", None).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn admin_listing_filters_by_tag_and_search() {
    let app = TestApp::spawn().await;
    create_post(&app, "Payroll Deadlines").await;
    let (_, other) = app
        .request(
            "POST",
            "/api/admin/posts",
            Some(json!({ "title": "Audit Readiness", "content": "Keep receipts.", "tags": ["Audit"] })),
        )
        .await;
    assert_eq!(other["status"], "draft");

    let (_, by_tag) = app.request("GET", "/api/admin/posts?tag=audit", None).await;
    assert_eq!(by_tag["total"], 1);
    assert_eq!(by_tag["items"][0]["title"], "Audit Readiness");

    let (_, by_search) = app.request("GET", "/api/admin/posts?search=deadline", None).await;
    assert_eq!(by_search["total"], 1);
    assert_eq!(by_search["items"][0]["title"], "Payroll Deadlines");

    let (_, drafts) = app.request("GET", "/api/admin/posts?status=draft&page_size=1", None).await;
    assert_eq!(drafts["total"], 2);
    assert_eq!(drafts["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn category_cycles_are_rejected() {
    let app = TestApp::spawn().await;

    let (_, tax) = app
        .request("POST", "/api/admin/categories", Some(json!({ "name": "Tax" })))
        .await;
    let tax_id = tax["id"].as_str().unwrap();

    let (status, planning) = app
        .request(
            "POST",
            "/api/admin/categories",
            Some(json!({ "name": "Tax Planning", "parent_id": tax_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let planning_id = planning["id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/admin/categories/{tax_id}"),
            Some(json!({ "parent_id": planning_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/admin/categories/{tax_id}"),
            Some(json!({ "parent_id": tax_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, tree) = app.public_request("GET", "/api/categories", None).await;
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["children"][0]["name"], "Tax Planning");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn deleting_a_category_promotes_its_children() {
    let app = TestApp::spawn().await;

    let (_, parent) = app
        .request("POST", "/api/admin/categories", Some(json!({ "name": "Advisory" })))
        .await;
    let parent_id = parent["id"].as_str().unwrap();
    let (_, child) = app
        .request(
            "POST",
            "/api/admin/categories",
            Some(json!({ "name": "Succession", "parent_id": parent_id })),
        )
        .await;

    let (status, _) = app
        .request("DELETE", &format!("/api/admin/categories/{parent_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, all) = app.request("GET", "/api/admin/categories", None).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["id"], child["id"]);
    assert!(all[0]["parent_id"].is_null());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn hidden_categories_stay_out_of_the_public_tree() {
    let app = TestApp::spawn().await;

    let (_, internal) = app
        .request(
            "POST",
            "/api/admin/categories",
            Some(json!({ "name": "Internal", "is_visible": false })),
        )
        .await;
    app.request(
        "POST",
        "/api/admin/categories",
        Some(json!({ "name": "Staff Memos", "parent_id": internal["id"] })),
    )
    .await;
    app.request("POST", "/api/admin/categories", Some(json!({ "name": "Payroll" })))
        .await;

    let (_, tree) = app.public_request("GET", "/api/categories", None).await;
    let names: Vec<&str> = tree
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Payroll"]);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn assigning_an_unknown_category_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let post = create_post(&app, "Bookkeeping 101").await;
    let id = post["id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/admin/posts/{id}/categories"),
            Some(json!({ "category_ids": [uuid::Uuid::new_v4()] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn unknown_category_on_create_leaves_no_post_behind() {
    let app = TestApp::spawn().await;
    let body = json!({
        "title": "Payroll Tax Calendar",
        "content": "File on time.",
        "category_ids": [uuid::Uuid::new_v4()],
        "tags": ["Payroll"],
    });

    let (status, _) = app.request("POST", "/api/admin/posts", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listing) = app.request("GET", "/api/admin/posts", None).await;
    assert_eq!(listing["total"], 0);
    let (_, tags) = app.request("GET", "/api/admin/tags", None).await;
    assert!(tags.as_array().unwrap().is_empty());

    // the slug is still free for a corrected retry
    let (status, post) = app
        .request(
            "POST",
            "/api/admin/posts",
            Some(json!({ "title": "Payroll Tax Calendar", "content": "File on time." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    assert_eq!(post["slug"], "payroll-tax-calendar");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn tag_creation_is_find_or_create() {
    let app = TestApp::spawn().await;

    let (_, first) = app
        .request("POST", "/api/admin/tags", Some(json!({ "name": "Cash Flow" })))
        .await;
    let (_, second) = app
        .request("POST", "/api/admin/tags", Some(json!({ "name": "cash flow" })))
        .await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["slug"], "cash-flow");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn subscribe_is_idempotent_and_reactivates() {
    let app = TestApp::spawn().await;
    let body = json!({ "email": "Owner@Example.com", "name": "Pat" });

    let (status, _) = app
        .public_request("POST", "/api/newsletter/subscribe", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.public_request("POST", "/api/newsletter/subscribe", Some(body.clone()))
        .await;

    let (_, listing) = app.request("GET", "/api/admin/subscribers", None).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["email"], "owner@example.com");

    app.public_request(
        "POST",
        "/api/newsletter/unsubscribe",
        Some(json!({ "email": "owner@example.com" })),
    )
    .await;
    let (_, listing) = app
        .request("GET", "/api/admin/subscribers?status=unsubscribed", None)
        .await;
    assert_eq!(listing["total"], 1);

    app.public_request("POST", "/api/newsletter/subscribe", Some(body))
        .await;
    let (_, listing) = app
        .request("GET", "/api/admin/subscribers?status=active", None)
        .await;
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn bounced_addresses_need_an_admin_to_return() {
    let app = TestApp::spawn().await;
    let subscriber = app.db().subscribe("bounce@example.com", None).await.unwrap();
    app.db()
        .set_subscriber_status(subscriber.id, content_service::models::SubscriberStatus::Bounced)
        .await
        .unwrap();

    let (status, _) = app
        .public_request(
            "POST",
            "/api/newsletter/subscribe",
            Some(json!({ "email": "bounce@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db().active_subscribers().await.unwrap().is_empty());

    let (status, reactivated) = app
        .request(
            "PUT",
            &format!("/api/admin/subscribers/{}/status", subscriber.id),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reactivated["status"], "active");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn unsubscribing_an_unknown_address_looks_the_same() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .public_request(
            "POST",
            "/api/newsletter/unsubscribe",
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unsubscribed"], true);
}
