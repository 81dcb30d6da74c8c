use super::*;
use crate::fake::{Failure, FakeBackend};
use serde_json::json;

fn client(backend: &Arc<FakeBackend>) -> ResourceClient {
    ResourceClient::new(backend.clone()).with_token("tok-admin")
}

fn fields(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn missing_token_is_unauthorized_without_network() {
    let backend = FakeBackend::new();
    let anon = ResourceClient::new(backend.clone());
    let err = anon.list(ResourceKind::Department, &ListParams::default()).await.unwrap_err();
    assert_eq!(err, ClientError::Unauthorized);
    assert_eq!(backend.calls("/department/list"), 0);

    let empty = ResourceClient::new(backend.clone()).with_token("");
    assert!(empty.current_user().await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn create_then_list_round_trip() {
    let backend = FakeBackend::new();
    let c = client(&backend);
    let created = c
        .create(ResourceKind::Department, fields(json!({"name": "College of Engineering", "alias": "COE", "color": "red-500"})))
        .await
        .unwrap();
    assert_eq!(created.field_str("alias"), Some("COE"));
    assert!(!created.is_disabled);

    let params = ListParams { take: 20, ..Default::default() };
    let rows = c.list(ResourceKind::Department, &params).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, created.id);
}

#[tokio::test]
async fn domain_error_with_http_200_is_not_success() {
    let backend = FakeBackend::new();
    backend.fail_next("/program/create", Failure::Domain("Alias already taken".into()));
    let err = client(&backend)
        .create(ResourceKind::Program, fields(json!({"name": "x", "alias": "X"})))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Domain("Alias already taken".into()));
    assert!(backend.rows("program").is_empty());
}

#[tokio::test]
async fn three_failure_classes_stay_distinct() {
    let backend = FakeBackend::new();
    let c = client(&backend);
    let params = ListParams::default();

    backend.fail_next("/department/list", Failure::Transport);
    assert!(matches!(c.list(ResourceKind::Department, &params).await, Err(ClientError::Transport(_))));

    backend.fail_next("/department/list", Failure::Status(500));
    assert_eq!(c.list(ResourceKind::Department, &params).await.unwrap_err(), ClientError::Http { status: 500 });

    backend.fail_next("/department/list", Failure::Status(401));
    assert_eq!(c.list(ResourceKind::Department, &params).await.unwrap_err(), ClientError::Unauthorized);

    backend.fail_next("/department/list", Failure::Domain("nope".into()));
    assert_eq!(c.list(ResourceKind::Department, &params).await.unwrap_err(), ClientError::Domain("nope".into()));
}

#[tokio::test]
async fn toggle_twice_restores_original_state() {
    let backend = FakeBackend::new();
    backend.seed("program", Resource::new("p1").with("alias", "BSCS").with("name", "Computer Science"));
    let c = client(&backend);

    let first = c.toggle(ResourceKind::Program, "p1", true).await.unwrap();
    assert!(first.is_disabled);
    let second = c.toggle(ResourceKind::Program, "p1", false).await.unwrap();
    assert!(!second.is_disabled);
    assert!(!backend.rows("program")[0].is_disabled);
}

#[tokio::test]
async fn moderator_lifecycle_goes_through_role_endpoints() {
    let backend = FakeBackend::new();
    backend.seed_user(Resource::new("u1").with("email", "student@school.edu").with("role", "STUDENT"));
    let c = client(&backend);

    let m = c.create(ResourceKind::Moderator, fields(json!({"email": "reg@school.edu"}))).await.unwrap();
    assert_eq!(m.field_str("role"), Some("REGISTRY"));

    let mods = c.list(ResourceKind::Moderator, &ListParams { take: 20, ..Default::default() }).await.unwrap();
    assert_eq!(mods.len(), 1);
    assert_eq!(mods[0].field_str("email"), Some("reg@school.edu"));

    c.delete(ResourceKind::Moderator, &m.id).await.unwrap();
    let mods = c.list(ResourceKind::Moderator, &ListParams { take: 20, ..Default::default() }).await.unwrap();
    assert!(mods.is_empty());
}

#[tokio::test]
async fn unsupported_operation_fails_locally() {
    let backend = FakeBackend::new();
    let err = client(&backend).create(ResourceKind::Student, Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::Domain(_)));
}

#[tokio::test]
async fn current_user_resolves_registered_session() {
    let backend = FakeBackend::new();
    backend.add_session("tok-admin", json!({
        "id": "u1", "email": "admin@school.edu", "isDisabled": false,
        "UserLevel": {"id": "l1", "email": "admin@school.edu", "role": "ADMIN"}
    }));
    let user = client(&backend).current_user().await.unwrap();
    assert_eq!(user.role(), Some(crate::model::Role::Admin));

    let stranger = ResourceClient::new(backend.clone()).with_token("tok-unknown");
    assert!(matches!(stranger.current_user().await, Err(ClientError::Domain(_))));
}

#[test]
fn interpret_prefers_message_over_error_code() {
    let reply = Reply { status: 200, body: json!({"error": "E_DUP", "message": "Department exists"}) };
    assert_eq!(interpret("/x", reply).unwrap_err(), ClientError::Domain("Department exists".into()));

    let reply = Reply { status: 200, body: json!({"error": null, "id": "d1"}) };
    assert!(interpret("/x", reply).is_ok());
}
