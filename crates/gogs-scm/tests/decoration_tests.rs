//! Integration tests for organization and repository decoration.

use std::sync::{Arc, Mutex};

use gogs_scm::{Decoration, DecorationTarget, Decorator, GogsConnector, GogsScmNavigator};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingTarget {
    applied: Mutex<Vec<Decoration>>,
}

impl DecorationTarget for RecordingTarget {
    fn key(&self) -> String {
        "folder/acme".to_string()
    }

    fn decorate(&self, decoration: Decoration) {
        self.applied.lock().unwrap().push(decoration);
    }
}

#[tokio::test]
async fn test_apply_org_decoration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orgs/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "username": "acme",
            "full_name": "Acme Corp",
            "avatar_url": "http://gogs.local:3000/avatars/3",
            "description": "Everything"
        })))
        .mount(&server)
        .await;

    let navigator = GogsScmNavigator::new(&server.uri(), "acme").unwrap();
    let decorator = Decorator::new(GogsConnector::default());
    let target = RecordingTarget::default();

    assert!(decorator.apply_org(&target, &navigator).await.unwrap());
    assert!(!decorator.guards().is_held("folder/acme"));

    let applied = target.applied.lock().unwrap();
    match &applied[0] {
        Decoration::Org(org) => {
            assert_eq!(org.name, "acme");
            assert_eq!(org.display_name.as_deref(), Some("Acme Corp"));
            assert_eq!(org.url, "http://gogs.local:3000/acme");
        }
        other => panic!("unexpected decoration: {other:?}"),
    }
}

#[tokio::test]
async fn test_reentrant_decoration_is_skipped() {
    let server = MockServer::start().await;

    let navigator = GogsScmNavigator::new(&server.uri(), "acme").unwrap();
    let decorator = Decorator::new(GogsConnector::default());
    let target = RecordingTarget::default();

    let _held = decorator.guards().acquire("folder/acme").unwrap();
    assert!(!decorator.apply_org(&target, &navigator).await.unwrap());
    assert!(!decorator
        .apply_repo(&target, &navigator, "api")
        .await
        .unwrap());

    assert!(target.applied.lock().unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_apply_repo_releases_guard_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/acme/api"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let navigator = GogsScmNavigator::new(&server.uri(), "acme").unwrap();
    let decorator = Decorator::new(GogsConnector::default());
    let target = RecordingTarget::default();

    assert!(decorator.apply_repo(&target, &navigator, "api").await.is_err());
    assert!(!decorator.guards().is_held("folder/acme"));
}

#[tokio::test]
async fn test_apply_repo_decoration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/acme/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "acme/api",
            "description": "Public API",
            "html_url": "http://gogs.local/acme/api",
            "private": true
        })))
        .mount(&server)
        .await;

    let navigator = GogsScmNavigator::new(&server.uri(), "acme").unwrap();
    let decorator = Decorator::new(GogsConnector::default());
    let target = Arc::new(RecordingTarget::default());

    assert!(decorator
        .apply_repo(target.as_ref(), &navigator, "api")
        .await
        .unwrap());

    let applied = target.applied.lock().unwrap();
    assert_eq!(applied.len(), 1);
    match &applied[0] {
        Decoration::Repo(repo) => {
            assert_eq!(repo.full_name, "acme/api");
            assert_eq!(repo.url.as_deref(), Some("http://gogs.local/acme/api"));
            assert!(repo.private);
        }
        other => panic!("unexpected decoration: {other:?}"),
    }
}
