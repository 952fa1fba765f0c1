//! Integration tests for webhook registration against a mock Gogs server.

use std::sync::Arc;

use gogs_scm::{
    GogsConnector, GogsScmSource, HookRegistrar, HostSource, SourceOwner, SourceOwners,
    WebhookManager,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOOK_URL: &str = "http://ci.local/gogs-scmsource-hook/notify";

// =============================================================================
// Static host
// =============================================================================

struct Container {
    id: String,
    sources: Vec<HostSource>,
}

impl SourceOwner for Container {
    fn id(&self) -> &str {
        &self.id
    }

    fn sources(&self) -> Vec<HostSource> {
        self.sources.clone()
    }

    fn reindex(&self, _source: &GogsScmSource) {}
}

struct Owners(Vec<Arc<dyn SourceOwner>>);

impl SourceOwners for Owners {
    fn all(&self) -> Vec<Arc<dyn SourceOwner>> {
        self.0.clone()
    }
}

fn source(server: &MockServer, repository: &str, auto_register: bool) -> HostSource {
    HostSource::Gogs(
        GogsScmSource::new(&server.uri(), "alice", repository)
            .unwrap()
            .with_auto_register_hook(auto_register),
    )
}

fn container(id: &str, sources: Vec<HostSource>) -> Arc<dyn SourceOwner> {
    Arc::new(Container {
        id: id.to_string(),
        sources,
    })
}

fn manager(owners: Vec<Arc<dyn SourceOwner>>, hook_url: Option<&str>) -> WebhookManager {
    WebhookManager::new(
        GogsConnector::default(),
        Arc::new(Owners(owners)),
        hook_url.map(String::from),
    )
}

fn existing_hook(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "type": "gogs",
        "active": true,
        "config": { "url": HOOK_URL, "content_type": "json" },
        "events": ["push", "create", "pull_request"]
    })
}

fn expected_registration() -> serde_json::Value {
    json!({
        "active": true,
        "type": "gogs",
        "config": { "url": HOOK_URL, "content_type": "json" },
        "events": ["push", "create", "pull_request"]
    })
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_twice_creates_one_hook() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing_hook(9)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .and(body_json(expected_registration()))
        .respond_with(ResponseTemplate::new(201).set_body_json(existing_hook(9)))
        .expect(1)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    let (registrar, _worker) = HookRegistrar::spawn(manager(vec![Arc::clone(&team)], Some(HOOK_URL)));

    registrar.on_created(Arc::clone(&team));
    registrar.on_updated(team);
    registrar.flush().await;

    server.verify().await;
}

#[tokio::test]
async fn test_existing_foreign_hooks_do_not_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 3,
            "type": "slack",
            "active": true,
            "config": { "url": "http://chat.local/hook", "content_type": "json" },
            "events": ["push"]
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(existing_hook(4)))
        .expect(1)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .register_hooks(team.as_ref())
        .await;

    server.verify().await;
}

#[tokio::test]
async fn test_sources_without_auto_register_are_skipped() {
    let server = MockServer::start().await;

    let team = container(
        "team",
        vec![
            source(&server, "proj", false),
            HostSource::Other {
                kind: "git".to_string(),
                id: "mirror".to_string(),
            },
        ],
    );
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .register_hooks(team.as_ref())
        .await;

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_root_url_registers_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    manager(vec![Arc::clone(&team)], None)
        .register_hooks(team.as_ref())
        .await;

    server.verify().await;
}

#[tokio::test]
async fn test_failure_on_one_source_does_not_stop_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/broken/hooks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(existing_hook(2)))
        .expect(1)
        .mount(&server)
        .await;

    let team = container(
        "team",
        vec![source(&server, "broken", true), source(&server, "proj", true)],
    );
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .register_hooks(team.as_ref())
        .await;

    server.verify().await;
}

#[tokio::test]
async fn test_mixed_hook_list_keeps_registration_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            existing_hook(9),
            { "id": 10, "type": "slack", "config": { "url": "http://chat.local" }, "events": ["push"] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .register_hooks(team.as_ref())
        .await;

    server.verify().await;
}

#[tokio::test]
async fn test_unreadable_hook_list_skips_registration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .register_hooks(team.as_ref())
        .await;

    server.verify().await;
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn test_remove_unshared_hook() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing_hook(5)])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/repos/alice/proj/hooks/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    let ops = container("ops", vec![source(&server, "other", true)]);
    manager(vec![Arc::clone(&team), ops], Some(HOOK_URL))
        .remove_hooks(team.as_ref())
        .await;

    server.verify().await;
}

#[tokio::test]
async fn test_shared_repository_hook_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing_hook(5)])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    // Another container uses the same repository without auto-registration.
    let ops = container("ops", vec![source(&server, "proj", false)]);
    let manager = manager(vec![Arc::clone(&team), Arc::clone(&ops)], Some(HOOK_URL));

    assert!(manager.is_used_somewhere_else(team.as_ref(), "alice", "proj"));
    assert!(!manager.is_used_somewhere_else(team.as_ref(), "alice", "other"));

    manager.remove_hooks(team.as_ref()).await;

    server.verify().await;
}

#[tokio::test]
async fn test_remove_without_hook_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    manager(vec![Arc::clone(&team)], Some(HOOK_URL))
        .remove_hooks(team.as_ref())
        .await;

    server.verify().await;
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_register_then_remove_run_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing_hook(11)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/alice/proj/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(existing_hook(11)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/repos/alice/proj/hooks/11"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let team = container("team", vec![source(&server, "proj", true)]);
    let (registrar, worker) =
        HookRegistrar::spawn(manager(vec![Arc::clone(&team)], Some(HOOK_URL)));

    registrar.on_created(Arc::clone(&team));
    registrar.on_deleted(team);
    registrar.flush().await;
    drop(registrar);
    worker.await.unwrap();

    let sequence: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(sequence, vec!["GET", "POST", "GET", "DELETE"]);
    server.verify().await;
}
