//! REST client tests against a local mock server.

use fieldgate_client::{ClientConfig, RestPermissionApi};
use fieldgate_core::{
    ApiError, BulkCheckRequest, BulkUpdateRequest, CopyPermissionsRequest, PermissionApi,
    PermissionGrant,
};
use mockito::Matcher;
use serde_json::json;

fn api_for(base_url: &str) -> RestPermissionApi {
    let config = ClientConfig::from_toml(&format!(
        r#"
api_base_url = "{base_url}"
request_timeout_ms = 2000

[auth]
api_key = "test-key"
"#
    ))
    .unwrap();
    config.validate().unwrap();
    RestPermissionApi::new(&config).unwrap()
}

#[tokio::test]
async fn test_my_permissions_decodes_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/ui-permissions/my-permissions/")
        .match_header("x-api-key", "test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "permissions": {"jobs.module.root": true, "jobs.detail.edit": false},
                "groups": ["staff"],
                "cached_at": "2024-01-01T00:00:00Z"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = api_for(&server.url());
    let snapshot = api.my_permissions().await.unwrap();

    mock.assert_async().await;
    assert_eq!(snapshot.permissions.len(), 2);
    assert_eq!(snapshot.permissions.get("jobs.detail.edit"), Some(&false));
    assert_eq!(snapshot.groups, vec!["staff".to_string()]);
}

#[tokio::test]
async fn test_trailing_slash_in_base_url_is_trimmed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/ui-permissions/my-permissions/")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let api = api_for(&format!("{}/", server.url()));
    let snapshot = api.my_permissions().await.unwrap();

    mock.assert_async().await;
    assert!(snapshot.permissions.is_empty());
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/ui-permissions/my-permissions/")
        .with_status(500)
        .with_body(r#"{"detail": "database unavailable"}"#)
        .create_async()
        .await;

    let api = api_for(&server.url());
    let err = api.my_permissions().await.unwrap_err();

    assert_eq!(err, ApiError::status(500, "database unavailable"));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/users/ui-permissions/my-permissions/")
        .with_status(200)
        .with_body("<html>login</html>")
        .create_async()
        .await;

    let api = api_for(&server.url());
    let err = api.my_permissions().await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let api = api_for("http://127.0.0.1:9");
    let err = api.my_permissions().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_check_bulk_posts_codenames_and_mode() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users/ui-permissions/check-bulk/")
        .match_body(Matcher::Json(json!({
            "codenames": ["sites.list.view", "sites.list.export"],
            "check_all": false
        })))
        .with_status(200)
        .with_body(
            json!({
                "permissions": {"sites.list.view": true, "sites.list.export": false},
                "hasAny": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = api_for(&server.url());
    let result = api
        .check_bulk(&BulkCheckRequest {
            codenames: vec!["sites.list.view".into(), "sites.list.export".into()],
            check_all: false,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.has_any, Some(true));
    assert_eq!(result.has_all, None);
    assert_eq!(result.permissions.get("sites.list.export"), Some(&false));
}

#[tokio::test]
async fn test_permission_tree_scoped_to_group() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/ui-permissions/tree/")
        .match_query(Matcher::UrlEncoded("group_id".into(), "3".into()))
        .with_status(200)
        .with_body(
            json!([{
                "id": 1,
                "codename": "settings",
                "name": "Settings",
                "description": "Settings console",
                "is_granted": true,
                "children": [
                    {"id": 2, "codename": "settings.permissions", "name": "Permissions", "description": ""}
                ]
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let api = api_for(&server.url());
    let tree = api.permission_tree(Some(3)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].children[0].codename, "settings.permissions");
}

#[tokio::test]
async fn test_permission_dependencies() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/ui-permissions/sites.detail.actions.test_meter/dependencies/")
        .with_status(200)
        .with_body(
            json!({
                "depends_on": [{"codename": "sites.detail", "name": "Site detail", "is_granted": true}],
                "required_by": []
            })
            .to_string(),
        )
        .create_async()
        .await;

    let api = api_for(&server.url());
    let deps = api
        .permission_dependencies("sites.detail.actions.test_meter")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(deps.depends_on.len(), 1);
    assert!(deps.required_by.is_empty());
}

#[tokio::test]
async fn test_bulk_update_accepts_empty_success_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users/group-ui-permissions/bulk-update/")
        .match_body(Matcher::Json(json!({
            "group_id": 4,
            "permissions": [{"codename": "holidays.approve", "is_granted": true}]
        })))
        .with_status(204)
        .create_async()
        .await;

    let api = api_for(&server.url());
    api.bulk_update_group_permissions(&BulkUpdateRequest {
        group_id: 4,
        permissions: vec![PermissionGrant::new("holidays.approve", true)],
    })
    .await
    .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_copy_permissions_failure_propagates() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/users/group-ui-permissions/copy-permissions/")
        .match_body(Matcher::Json(json!({"from_group_id": 1, "to_group_id": 2})))
        .with_status(400)
        .with_body(r#"{"error": "target group is a system group"}"#)
        .create_async()
        .await;

    let api = api_for(&server.url());
    let err = api
        .copy_permissions(&CopyPermissionsRequest {
            from_group_id: 1,
            to_group_id: 2,
        })
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::status(400, "target group is a system group"));
}
