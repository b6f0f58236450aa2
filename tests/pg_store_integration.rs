use std::collections::BTreeMap;

use hook_lab::{
    db::{pg::PgHookStore, HookStore},
    domain::{
        CapturedBody, EndpointChanges, ForwardStatus, NewCapturedRequest, NewEndpoint,
        NewForwardAttempt, NewReplayAttempt, DEFAULT_RESPONSE_BODY,
    },
    registry,
};

#[tokio::test]
async fn postgres_round_trips_captures_and_attempts() -> Result<(), Box<dyn std::error::Error>> {
    let Some(database_url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping integration test: DATABASE_URL is not set");
        return Ok(());
    };

    let store = PgHookStore::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(store.pool()).await?;

    let owner = uuid::Uuid::new_v4();
    let endpoint = store
        .create_endpoint(NewEndpoint {
            owner_id: owner,
            slug: registry::generate_slug(),
            name: "integration".to_owned(),
            description: Some("pg".to_owned()),
            forward_url: Some("http://127.0.0.1:9/".to_owned()),
            response_status: 202,
            response_body: DEFAULT_RESPONSE_BODY.to_owned(),
            response_headers: BTreeMap::from([("x-reply".to_owned(), "1".to_owned())]),
            is_active: true,
        })
        .await?;

    let found = store
        .find_endpoint_by_slug(&endpoint.slug)
        .await?
        .expect("endpoint by slug");
    assert_eq!(found.id, endpoint.id);
    assert_eq!(found.response_headers["x-reply"], "1");

    let updated = store
        .update_endpoint(
            endpoint.id,
            owner,
            EndpointChanges {
                forward_url: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert!(updated.forward_url.is_none());

    let captured = store
        .create_captured_request(NewCapturedRequest {
            endpoint_id: endpoint.id,
            method: "POST".to_owned(),
            path: format!("/hook/{}", endpoint.slug),
            query_params: BTreeMap::from([("a".to_owned(), "1".to_owned())]),
            headers: BTreeMap::from([(
                "content-type".to_owned(),
                "application/json".to_owned(),
            )]),
            body: Some(CapturedBody::from_text(r#"{"ok":true}"#.to_owned())),
            source_ip: "203.0.113.1".to_owned(),
        })
        .await?;
    assert_eq!(captured.body_parsed, Some(serde_json::json!({"ok": true})));

    let listed = store.list_captured_requests(endpoint.id, 100).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].query_params["a"], "1");

    store
        .create_forward_attempt(NewForwardAttempt {
            request_id: captured.id,
            forward_url: "http://127.0.0.1:9/".to_owned(),
            status: ForwardStatus::Failed,
            response_status: None,
            response_body: None,
            duration_ms: 3,
            error_message: Some("connection refused".to_owned()),
        })
        .await?;
    let forward = store
        .find_forward_attempt(captured.id)
        .await?
        .expect("forward attempt");
    assert_eq!(forward.status, ForwardStatus::Failed);

    for _ in 0..2 {
        store
            .create_replay_attempt(NewReplayAttempt {
                request_id: captured.id,
                target_url: "http://127.0.0.1:9/".to_owned(),
                method: "POST".to_owned(),
                headers: BTreeMap::new(),
                body: captured.body.clone(),
                response_status: Some(200),
                response_body: Some(String::new()),
                duration_ms: 1,
                error_message: None,
            })
            .await?;
    }
    assert_eq!(store.list_replay_attempts(captured.id).await?.len(), 2);

    store.delete_endpoint(endpoint.id, owner).await?;
    assert!(store.find_endpoint_by_slug(&endpoint.slug).await?.is_none());

    Ok(())
}
