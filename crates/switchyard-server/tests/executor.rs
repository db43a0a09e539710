//! `POST /executor` against an in-memory store.

mod common;

use axum::http::StatusCode;
use futures::future::join_all;
use serde_json::json;
use switchyard_core::{NewBundle, NewRoute};
use switchyard_store::Store;

use common::{ScriptedModel, StaticTools, TestApp};

/// Stores a bundle over `mcp_ids` with one route per description, like the bundler would.
async fn seed_bundle(app: &TestApp, mcp_ids: &[String], tasks: &[&str]) -> (String, Vec<String>) {
    let bundle = app
        .store
        .insert_bundle(&NewBundle {
            project_id: "proj".into(),
            description: "Issue triage".into(),
            mcps: mcp_ids.to_vec(),
            routes: vec![],
        })
        .await
        .unwrap();

    let mut route_ids = Vec::new();
    for (i, task) in tasks.iter().enumerate() {
        let route = app
            .store
            .insert_route(&NewRoute {
                bundle_id: bundle.id.clone(),
                task_description: task.to_string(),
                tool_sequence: vec!["search".into()],
                notes: String::new(),
                execution_order: i as i64,
                mcp_tools: mcp_ids.to_vec(),
            })
            .await
            .unwrap();
        route_ids.push(route.id);
    }
    app.store.set_bundle_routes(&bundle.id, &route_ids).await.unwrap();
    (bundle.id, route_ids)
}

#[tokio::test]
async fn matched_route_is_reported() {
    let app = TestApp::new(ScriptedModel::replying("placeholder"), StaticTools::new(&["search"]));
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, route_ids) = seed_bundle(&app, &mcp_ids, &["Find issues", "Close stale"]).await;

    app.model.reply_with(
        &json!({
            "matched_route": true,
            "route_used": route_ids[1],
            "execution_result": "Closed 4 stale issues"
        })
        .to_string(),
    );

    let (status, body) = app
        .post("/executor", json!({"bundle_id": bundle_id, "request": "close stale issues"}))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["result"], "Closed 4 stale issues");
    assert_eq!(body["route_used"], route_ids[1].as_str());
    assert_eq!(body["new_route_created"], false);
}

#[tokio::test]
async fn empty_route_used_defaults_to_first_route() {
    let app = TestApp::new(
        ScriptedModel::replying(r#"{"matched_route": true, "execution_result": "done"}"#),
        StaticTools::new(&["search"]),
    );
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, route_ids) = seed_bundle(&app, &mcp_ids, &["Find issues", "Close stale"]).await;

    let (status, body) = app
        .post("/executor", json!({"bundle_id": bundle_id, "request": "find"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route_used"], route_ids[0].as_str());
    assert_eq!(body["new_route_created"], false);
}

#[tokio::test]
async fn zero_routes_always_create_a_new_route() {
    for reply in [
        r#"{"matched_route": false, "execution_result": "improvised", "new_route_created": true}"#,
        r#"{"matched_route": false, "execution_result": "improvised"}"#,
        "Just did it without any JSON.",
    ] {
        let app = TestApp::new(ScriptedModel::replying(reply), StaticTools::new(&["search"]));
        let mcp_ids = app.seed_mcps(&["github"]).await;
        let (bundle_id, _) = seed_bundle(&app, &mcp_ids, &[]).await;

        let (status, body) = app
            .post("/executor", json!({"bundle_id": bundle_id, "request": "anything"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["new_route_created"], true, "reply: {reply}");
    }
}

#[tokio::test]
async fn unreadable_reply_returns_raw_text() {
    let app = TestApp::new(ScriptedModel::replying("Sorry, I did it my way."), StaticTools::new(&["search"]));
    let mcp_ids = app.seed_mcps(&["github"]).await;

    let (with_routes, route_ids) = seed_bundle(&app, &mcp_ids, &["Find issues"]).await;
    let (_, body) = app
        .post("/executor", json!({"bundle_id": with_routes, "request": "go"}))
        .await;
    assert_eq!(body["result"], "Sorry, I did it my way.");
    assert_eq!(body["route_used"], route_ids[0].as_str());
    assert_eq!(body["new_route_created"], false);

    let (without_routes, _) = seed_bundle(&app, &mcp_ids, &[]).await;
    let (_, body) = app
        .post("/executor", json!({"bundle_id": without_routes, "request": "go"}))
        .await;
    assert_eq!(body["route_used"], "new_route_created");
    assert_eq!(body["new_route_created"], true);
}

#[tokio::test]
async fn structured_reply_without_routes_reports_new_route() {
    let app = TestApp::new(
        ScriptedModel::replying(r#"{"matched_route": false, "execution_result": "ok", "new_route_created": true}"#),
        StaticTools::new(&["search"]),
    );
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, _) = seed_bundle(&app, &mcp_ids, &[]).await;

    let (_, body) = app
        .post("/executor", json!({"bundle_id": bundle_id, "request": "go"}))
        .await;
    assert_eq!(body["route_used"], "new_route");
}

#[tokio::test]
async fn unknown_bundle_is_not_found_and_writes_nothing() {
    let app = TestApp::new(ScriptedModel::replying("unused"), StaticTools::new(&["search"]));
    let bundles_before = app.store.bundle_count().unwrap();

    let (status, body) = app
        .post("/executor", json!({"bundle_id": "does-not-exist", "request": "go"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Bundle not found");
    assert_eq!(app.store.bundle_count().unwrap(), bundles_before);
    assert_eq!(app.store.route_count().unwrap(), 0);
    assert_eq!(app.model.call_count(), 0);
    assert_eq!(app.tools.loads.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn executor_never_writes() {
    let app = TestApp::new(
        ScriptedModel::replying(r#"{"matched_route": false, "execution_result": "new", "new_route_created": true}"#),
        StaticTools::new(&["search"]),
    );
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, route_ids) = seed_bundle(&app, &mcp_ids, &["One"]).await;

    app.post("/executor", json!({"bundle_id": bundle_id, "request": "something new"}))
        .await;

    assert_eq!(app.store.bundle_count().unwrap(), 1);
    assert_eq!(app.store.route_count().unwrap(), 1);
    let bundle = app.store.get_bundle(&bundle_id).await.unwrap().unwrap();
    assert_eq!(bundle.routes, route_ids);
}

#[tokio::test]
async fn prompt_enumerates_routes() {
    let app = TestApp::new(
        ScriptedModel::replying(r#"{"matched_route": true, "execution_result": "x"}"#),
        StaticTools::new(&["search"]),
    );
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, route_ids) = seed_bundle(&app, &mcp_ids, &["Find issues", "Close stale"]).await;

    app.post("/executor", json!({"bundle_id": bundle_id, "request": "tidy up"}))
        .await;

    let prompts = app.model.system_prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert!(prompt.contains(&format!("Route 1 (ID: {}): Find issues", route_ids[0])));
    assert!(prompt.contains(&format!("Route 2 (ID: {}): Close stale", route_ids[1])));
    assert!(prompt.contains("For the user request: \"tidy up\""));
    assert!(prompt.contains("Bundle description: Issue triage"));

    let records = app.tools.last_records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "github");
}

#[tokio::test]
async fn bundle_without_tool_servers_is_a_server_error() {
    let app = TestApp::new(ScriptedModel::replying("unused"), StaticTools::new(&["search"]));
    let (bundle_id, _) = seed_bundle(&app, &["gone".to_string()], &[]).await;

    let (status, body) = app
        .post("/executor", json!({"bundle_id": bundle_id, "request": "go"}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("No MCP servers found"));
}

#[tokio::test]
async fn concurrent_calls_complete_independently() {
    let app = TestApp::new(
        ScriptedModel::replying(r#"{"matched_route": true, "execution_result": "handled"}"#),
        StaticTools::new(&["search"]),
    );
    let mcp_ids = app.seed_mcps(&["github"]).await;
    let (bundle_id, route_ids) = seed_bundle(&app, &mcp_ids, &["Find issues"]).await;

    let calls = (0..8).map(|i| {
        app.post(
            "/executor",
            json!({"bundle_id": bundle_id, "request": format!("request {i}")}),
        )
    });
    let results = join_all(calls).await;

    assert_eq!(results.len(), 8);
    for (status, body) in results {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "handled");
        assert_eq!(body["route_used"], route_ids[0].as_str());
    }
    assert_eq!(app.model.call_count(), 8);
}
