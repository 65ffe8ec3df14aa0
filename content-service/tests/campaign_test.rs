//! Campaign generation and publishing, newsletters and social series
//! against PostgreSQL with mocked AI, email and social providers.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -p content-service --test campaign_test -- --ignored

mod common;

use axum::http::StatusCode;
use common::TestApp;
use content_service::models::Platform;
use content_service::services::{MockEmailProvider, MockSocialPublisher};
use serde_json::json;
use serial_test::serial;

async fn direct_campaign(app: &TestApp) -> serde_json::Value {
    let (status, body) = app
        .request(
            "POST",
            "/api/admin/campaigns",
            Some(json!({
                "title": "Year-end payroll checklist",
                "content": "Close the books, reconcile payroll and file W-2s on time.",
                "keywords": ["payroll"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn add_subscribers(app: &TestApp, emails: &[&str]) {
    for email in emails {
        app.db().subscribe(email, None).await.unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn campaign_generation_stores_every_artifact() {
    let app = TestApp::spawn().await;

    let campaign = direct_campaign(&app).await;

    assert_eq!(campaign["status"], "ready");
    assert_eq!(campaign["topic"], "Year-end payroll checklist");
    assert_eq!(campaign["newsletter"]["status"], "draft");
    assert_eq!(campaign["newsletter"]["campaign_id"], campaign["id"]);
    assert_eq!(campaign["social_series"].as_array().unwrap().len(), 4);
    assert!(campaign["pdf_guide"]["title"].is_string());
    assert!(campaign["video_script"]["title"].is_string());

    for series in campaign["social_series"].as_array().unwrap() {
        let platform: Platform = serde_json::from_value(series["platform"].clone()).unwrap();
        assert_eq!(
            series["posts"].as_array().unwrap().len(),
            platform.series_length()
        );
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn campaign_needs_a_post_or_content() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .request(
            "POST",
            "/api/admin/campaigns",
            Some(json!({ "topic": "Payroll" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listing) = app.request("GET", "/api/admin/campaigns", None).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn campaign_from_a_post_publishes_the_post() {
    let app = TestApp::spawn().await;
    add_subscribers(&app, &["a@example.com", "b@example.com"]).await;

    let (_, post) = app
        .request(
            "POST",
            "/api/admin/posts",
            Some(json!({
                "title": "Estimated Taxes Explained",
                "content": "Pay quarterly to avoid penalties.",
                "focus_keyword": "estimated taxes",
            })),
        )
        .await;
    let post_id = post["id"].as_str().unwrap();

    let (status, campaign) = app
        .request(
            "POST",
            "/api/admin/campaigns",
            Some(json!({ "source_post_id": post_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(campaign["keywords"], json!(["estimated taxes"]));
    let campaign_id = campaign["id"].as_str().unwrap();

    let (status, report) = app
        .request("POST", &format!("/api/admin/campaigns/{campaign_id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "published");
    assert_eq!(report["blog"], true);
    assert_eq!(report["newsletter"], true);
    assert_eq!(report["social"]["linkedin"], true);
    assert!(report["errors"].as_array().unwrap().is_empty());

    let (_, post) = app
        .request("GET", &format!("/api/admin/posts/{post_id}"), None)
        .await;
    assert_eq!(post["status"], "published");

    assert_eq!(app.mailer.send_count(), 2);
    assert_eq!(app.publisher.published().len(), 4);

    let (_, detail) = app
        .request("GET", &format!("/api/admin/campaigns/{campaign_id}"), None)
        .await;
    assert_eq!(detail["newsletter"]["status"], "sent");
    assert_eq!(detail["newsletter"]["sent_count"], 2);
    for series in detail["social_series"].as_array().unwrap() {
        assert_eq!(series["status"], "published");
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn publishing_twice_is_a_conflict() {
    let app = TestApp::spawn().await;
    let campaign = direct_campaign(&app).await;
    let id = campaign["id"].as_str().unwrap();

    let (status, _) = app
        .request("POST", &format!("/api/admin/campaigns/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request("POST", &format!("/api/admin/campaigns/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn failing_channel_marks_campaign_failed_and_allows_regeneration() {
    let app = TestApp::spawn_with(
        MockEmailProvider::new(true),
        MockSocialPublisher::failing_for(&[Platform::Instagram]),
    )
    .await;
    let campaign = direct_campaign(&app).await;
    let id = campaign["id"].as_str().unwrap();

    let (status, report) = app
        .request("POST", &format!("/api/admin/campaigns/{id}/publish"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "failed");
    assert_eq!(report["social"]["instagram"], false);
    assert_eq!(report["social"]["linkedin"], true);
    assert!(report["errors"][0].as_str().unwrap().starts_with("instagram"));

    let (_, detail) = app
        .request("GET", &format!("/api/admin/campaigns/{id}"), None)
        .await;
    assert_eq!(detail["status"], "failed");
    assert!(detail["error_message"].as_str().unwrap().contains("instagram"));

    // direct-content campaigns need their source again
    let (status, _) = app
        .request("POST", &format!("/api/admin/campaigns/{id}/regenerate"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, regenerated) = app
        .request(
            "POST",
            &format!("/api/admin/campaigns/{id}/regenerate"),
            Some(json!({
                "title": "Year-end payroll checklist",
                "content": "Close the books and file W-2s on time.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(regenerated["status"], "ready");
    assert_eq!(regenerated["keywords"], json!(["payroll"]));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn ready_campaigns_cannot_be_regenerated() {
    let app = TestApp::spawn().await;
    let campaign = direct_campaign(&app).await;
    let id = campaign["id"].as_str().unwrap();

    let (status, _) = app
        .request("POST", &format!("/api/admin/campaigns/{id}/regenerate"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn newsletter_send_counts_partial_failures() {
    let app = TestApp::spawn_with(
        MockEmailProvider::rejecting(["bad@example.com"]),
        MockSocialPublisher::new(),
    )
    .await;
    add_subscribers(&app, &["good@example.com", "bad@example.com"]).await;

    let (status, newsletter) = app
        .request(
            "POST",
            "/api/admin/newsletters",
            Some(json!({
                "subject": "March checklist",
                "content_html": "<p>Hi</p>",
                "content_text": "Hi",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = newsletter["id"].as_str().unwrap();

    let (status, report) = app
        .request("POST", &format!("/api/admin/newsletters/{id}/send"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["outcome"]["recipients"], 2);
    assert_eq!(report["outcome"]["sent"], 1);
    assert_eq!(report["outcome"]["failed"], 1);
    assert_eq!(report["newsletter"]["status"], "sent");
    assert!(!report["newsletter"]["sent_at"].is_null());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .unsubscribe_url
        .as_deref()
        .unwrap()
        .contains("good%40example.com"));

    // sent newsletters are frozen
    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/admin/newsletters/{id}"),
            Some(json!({ "subject": "Edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request("POST", &format!("/api/admin/newsletters/{id}/send"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn newsletter_with_no_deliveries_fails() {
    let app = TestApp::spawn_with(
        MockEmailProvider::rejecting(["only@example.com"]),
        MockSocialPublisher::new(),
    )
    .await;
    add_subscribers(&app, &["only@example.com"]).await;

    let (_, newsletter) = app
        .request(
            "POST",
            "/api/admin/newsletters",
            Some(json!({ "subject": "Hello", "content_html": "<p>Hi</p>", "content_text": "Hi" })),
        )
        .await;
    let id = newsletter["id"].as_str().unwrap();

    let (_, report) = app
        .request("POST", &format!("/api/admin/newsletters/{id}/send"), None)
        .await;
    assert_eq!(report["newsletter"]["status"], "failed");
    assert!(report["newsletter"]["sent_at"].is_null());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn failed_outcome_write_does_not_leave_newsletter_sending() {
    let app = TestApp::spawn().await;
    add_subscribers(&app, &["client@example.com"]).await;

    let (_, newsletter) = app
        .request(
            "POST",
            "/api/admin/newsletters",
            Some(json!({ "subject": "April update", "content_html": "<p>Hi</p>", "content_text": "Hi" })),
        )
        .await;
    let id = newsletter["id"].as_str().unwrap();

    // reject only the final 'sent' write so the fallback path runs
    let pool = app.db().pool().clone();
    for statement in [
        "DROP TRIGGER IF EXISTS reject_sent_newsletters ON newsletters",
        r#"CREATE OR REPLACE FUNCTION reject_sent_newsletters() RETURNS trigger AS $$
           BEGIN
             IF NEW.status = 'sent' THEN RAISE EXCEPTION 'sent write rejected'; END IF;
             RETURN NEW;
           END $$ LANGUAGE plpgsql"#,
        "CREATE TRIGGER reject_sent_newsletters BEFORE UPDATE ON newsletters \
         FOR EACH ROW EXECUTE FUNCTION reject_sent_newsletters()",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    let (status, _) = app
        .request("POST", &format!("/api/admin/newsletters/{id}/send"), None)
        .await;

    sqlx::query("DROP TRIGGER reject_sent_newsletters ON newsletters")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DROP FUNCTION reject_sent_newsletters()")
        .execute(&pool)
        .await
        .unwrap();

    assert!(status.is_server_error(), "{status}");
    assert_eq!(app.mailer.send_count(), 1);

    let (_, after) = app
        .request("GET", &format!("/api/admin/newsletters/{id}"), None)
        .await;
    assert_eq!(after["status"], "failed");
    assert_eq!(after["recipient_count"], 1);
    assert_eq!(after["sent_count"], 1);
    assert!(after["sent_at"].is_null());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_send_leaves_the_newsletter_untouched() {
    let app = TestApp::spawn().await;

    let (_, newsletter) = app
        .request(
            "POST",
            "/api/admin/newsletters",
            Some(json!({ "subject": "Preview me", "content_html": "<p>Hi</p>", "content_text": "Hi" })),
        )
        .await;
    let id = newsletter["id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "POST",
            &format!("/api/admin/newsletters/{id}/test"),
            Some(json!({ "email": "editor@firm.example" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let sent = app.mailer.sent();
    assert_eq!(sent[0].subject, "[TEST] Preview me");

    let (_, after) = app
        .request("GET", &format!("/api/admin/newsletters/{id}"), None)
        .await;
    assert_eq!(after["status"], "draft");
    assert_eq!(after["sent_count"], 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn single_series_publish_records_the_outcome() {
    let app = TestApp::spawn_with(
        MockEmailProvider::new(true),
        MockSocialPublisher::failing_for(&[Platform::Twitter]),
    )
    .await;
    direct_campaign(&app).await;

    let (_, linkedin) = app
        .request("GET", "/api/admin/social-series?platform=linkedin", None)
        .await;
    let linkedin_id = linkedin["items"][0]["id"].as_str().unwrap();
    let (status, receipt) = app
        .request(
            "POST",
            &format!("/api/admin/social-series/{linkedin_id}/publish"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["platform"], "linkedin");

    let (_, twitter) = app
        .request("GET", "/api/admin/social-series?platform=twitter", None)
        .await;
    let twitter_id = twitter["items"][0]["id"].as_str().unwrap();
    let (status, _) = app
        .request(
            "POST",
            &format!("/api/admin/social-series/{twitter_id}/publish"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, series) = app
        .request("GET", &format!("/api/admin/social-series/{twitter_id}"), None)
        .await;
    assert_eq!(series["status"], "failed");
}
