use anyhow::Result;
use claims::{assert_none, assert_some};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};
use waitlist::utils::sha256_hex;

use crate::helpers::{assert_resp_redir_to, TestApp};

const INVALID_EMAIL_TEXT: &str = "Please enter a valid email. Go back and try again.";

#[tokio::test]
async fn subscribe_form_redirects_and_stores_the_subscriber() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_form(&[("email", "test@example.com")])
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    assert_eq!(1, app.subscriber_count().await?);

    let record = assert_some!(app.store.find_by_email("test@example.com").await?);
    assert_eq!("landing", record.source);

    Ok(())
}

#[tokio::test]
async fn subscribe_form_keeps_the_submitted_source() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_form(&[("email", "ursula@example.com"), ("source", "footer")])
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    let record = assert_some!(app.store.find_by_email("ursula@example.com").await?);
    assert_eq!("footer", record.source);

    Ok(())
}

#[tokio::test]
async fn subscribe_same_email_twice_stores_one_subscriber() -> Result<()> {
    let app = TestApp::spawn().await?;

    for source in ["landing", "second-try"] {
        let res = app
            .post_subscribe_form(&[("email", "test@example.com"), ("source", source)])
            .await?;
        assert_resp_redir_to(&res, "/?success=1");
    }

    assert_eq!(1, app.subscriber_count().await?);
    // The duplicate never overwrites what was stored first.
    let record = assert_some!(app.store.find_by_email("test@example.com").await?);
    assert_eq!("landing", record.source);

    Ok(())
}

#[tokio::test]
async fn subscribe_normalizes_email_before_deduplicating() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.post_subscribe_form(&[("email", " Foo@Bar.com ")])
        .await?;
    let res = app
        .post_subscribe_json(&json!({ "email": "foo@bar.com" }))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(1, app.subscriber_count().await?);
    assert_some!(app.store.find_by_email("foo@bar.com").await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_concurrent_duplicates_store_one_subscriber() -> Result<()> {
    let app = TestApp::spawn().await?;

    let handles = (0..16)
        .map(|_| {
            let request = app
                .http_client
                .post(app.url("/api/subscribe"))
                .json(&json!({ "email": "race@example.com" }));
            tokio::spawn(request.send())
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let res = handle.await??;
        assert_eq!(res.status(), StatusCode::OK);
    }

    assert_eq!(1, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_honeypot_pretends_success_and_stores_nothing() -> Result<()> {
    let app = TestApp::spawn().await?;

    let cases = [
        [("email", "test@example.com"), ("company", "spam")],
        [("email", "not an email"), ("company", "spam")],
        [("email", ""), ("company", "Acme Inc.")],
    ];

    for form in cases {
        let res = app.post_subscribe_form(&form).await?;
        assert_resp_redir_to(&res, "/?success=1");
    }

    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_blank_honeypot_is_not_a_bot() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_form(&[("email", "test@example.com"), ("company", "   ")])
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    assert_eq!(1, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_form_invalid_email_returns_plain_text_400() -> Result<()> {
    let app = TestApp::spawn().await?;

    let cases = [
        ("", "empty email"),
        ("ursuladomain.com", "missing @"),
        ("ursula@domain", "missing dot after @"),
        ("@domain.com", "missing subject"),
        ("ursula le@guin.com", "whitespace"),
    ];

    for (email, description) in cases {
        let res = app.post_subscribe_form(&[("email", email)]).await?;
        assert_eq!(
            400,
            res.status().as_u16(),
            "The API did not return a 400 BAD REQUEST for: {description}."
        );
        assert_eq!(INVALID_EMAIL_TEXT, res.text().await?);
    }

    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_form_content_type_is_case_insensitive() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_raw("Application/X-WWW-Form-Urlencoded", "email=up%40example.com")
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    assert_eq!(1, app.subscriber_count().await?);
    assert_some!(app.store.find_by_email("up@example.com").await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_json_falsy_source_uses_the_default() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.post_subscribe_json(&json!({ "email": "false@example.com", "source": false }))
        .await?;
    app.post_subscribe_json(&json!({ "email": "zero@example.com", "source": 0 }))
        .await?;

    for email in ["false@example.com", "zero@example.com"] {
        let record = assert_some!(app.store.find_by_email(email).await?);
        assert_eq!("landing", record.source);
    }

    Ok(())
}

#[tokio::test]
async fn subscribe_form_without_email_field_returns_400() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app.post_subscribe_form(&[("name", "Ursula")]).await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(INVALID_EMAIL_TEXT, res.text().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_json_ok() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_json(&json!({ "email": "john.doe@example.com", "source": "api" }))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json!({ "ok": true }), res.json::<Value>().await?);

    let record = assert_some!(app.store.find_by_email("john.doe@example.com").await?);
    assert_eq!("api", record.source);

    Ok(())
}

#[tokio::test]
async fn subscribe_json_invalid_email_returns_json_400() -> Result<()> {
    let app = TestApp::spawn().await?;

    let cases = [
        (json!({ "email": "bad-email" }), "invalid email"),
        (json!({}), "empty json"),
        (json!({ "email": null }), "null email"),
        (json!({ "email": ["a@b.co"] }), "email in an array"),
        (json!(["a@b.co"]), "not an object"),
    ];

    for (body, description) in cases {
        let res = app.post_subscribe_json(&body).await?;
        assert_eq!(
            res.status(),
            StatusCode::BAD_REQUEST,
            "Wrong response for: {description}"
        );
        assert_eq!(
            json!({ "ok": false, "error": "invalid_email" }),
            res.json::<Value>().await?
        );
    }

    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_malformed_json_is_treated_as_empty() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_raw("application/json", r#"{"email": "test@example.com""#)
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json!({ "ok": false, "error": "invalid_email" }),
        res.json::<Value>().await?
    );
    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_json_ignores_the_honeypot() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_json(&json!({ "email": "test@example.com", "company": "spam" }))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(1, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_unknown_content_type_is_an_invalid_email() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .post_subscribe_raw("text/plain", "email=test@example.com")
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(INVALID_EMAIL_TEXT, res.text().await?);
    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_multipart_form_ok() -> Result<()> {
    let app = TestApp::spawn().await?;

    let form = multipart::Form::new()
        .text("email", "Multi@Part.com")
        .text("source", "popup");
    let res = app
        .http_client
        .post(app.url("/api/subscribe"))
        .multipart(form)
        .send()
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    let record = assert_some!(app.store.find_by_email("multi@part.com").await?);
    assert_eq!("popup", record.source);

    Ok(())
}

#[tokio::test]
async fn subscribe_multipart_honeypot_stores_nothing() -> Result<()> {
    let app = TestApp::spawn().await?;

    let form = multipart::Form::new()
        .text("email", "test@example.com")
        .text("company", "spam");
    let res = app
        .http_client
        .post(app.url("/api/subscribe"))
        .multipart(form)
        .send()
        .await?;

    assert_resp_redir_to(&res, "/?success=1");
    assert_eq!(0, app.subscriber_count().await?);

    Ok(())
}

#[tokio::test]
async fn subscribe_stores_user_agent_and_hashed_client_ip() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .http_client
        .post(app.url("/api/subscribe"))
        .header("user-agent", "integration-test/1.0")
        .header("cf-connecting-ip", "203.0.113.7")
        .form(&[("email", "meta@example.com")])
        .send()
        .await?;
    assert_resp_redir_to(&res, "/?success=1");

    let record = assert_some!(app.store.find_by_email("meta@example.com").await?);
    assert_eq!(Some("integration-test/1.0".to_string()), record.user_agent);
    let ip_hash = assert_some!(record.ip_hash);
    assert_eq!(sha256_hex("203.0.113.7"), ip_hash);
    assert!(!ip_hash.contains("203.0.113.7"));

    Ok(())
}

#[tokio::test]
async fn subscribe_without_client_ip_stores_no_ip_hash() -> Result<()> {
    let app = TestApp::spawn().await?;

    app.post_subscribe_form(&[("email", "noip@example.com")])
        .await?;

    let record = assert_some!(app.store.find_by_email("noip@example.com").await?);
    assert_none!(record.ip_hash);
    assert_eq!(Some(String::new()), record.user_agent);

    Ok(())
}

#[tokio::test]
async fn subscribe_honours_a_custom_client_ip_header() -> Result<()> {
    let app = TestApp::spawn_with(|config| {
        config.subscribe_config.client_ip_header = "X-Real-IP".to_string();
    })
    .await?;

    app.http_client
        .post(app.url("/api/subscribe"))
        .header("cf-connecting-ip", "198.51.100.1")
        .header("x-real-ip", "192.0.2.10")
        .json(&json!({ "email": "proxy@example.com" }))
        .send()
        .await?;

    let record = assert_some!(app.store.find_by_email("proxy@example.com").await?);
    assert_eq!(Some(sha256_hex("192.0.2.10")), record.ip_hash);

    Ok(())
}

#[tokio::test]
async fn subscribe_with_metadata_capture_disabled_stores_none() -> Result<()> {
    let app = TestApp::spawn_with(|config| {
        config.subscribe_config.capture_metadata = false;
    })
    .await?;

    app.http_client
        .post(app.url("/api/subscribe"))
        .header("user-agent", "integration-test/1.0")
        .header("cf-connecting-ip", "203.0.113.7")
        .form(&[("email", "private@example.com")])
        .send()
        .await?;

    let record = assert_some!(app.store.find_by_email("private@example.com").await?);
    assert_none!(record.ip_hash);
    assert_none!(record.user_agent);

    Ok(())
}

#[tokio::test]
async fn subscribe_store_failure_returns_500() -> Result<()> {
    let app = TestApp::spawn_with_unreachable_db().await?;

    let res = app
        .post_subscribe_json(&json!({ "email": "test@example.com" }))
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.json::<Value>().await?;
    assert_eq!("Service Error!", body["error"]["message"]);
    assert!(body["error"]["data"]["req_id"].is_string());

    Ok(())
}
