use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use tree_api::api::create_router;
use tree_api::models::*;
use tree_api::storage::LocalFileBackend;
use tree_api::TreeManager;

async fn setup(path: &Path) -> TestServer {
    let storage = Arc::new(LocalFileBackend::new(path));
    let tree = TreeManager::hydrate(storage)
        .await
        .expect("Failed to hydrate");
    TestServer::new(create_router(Arc::new(tree))).expect("Failed to create test server")
}

async fn create_node(server: &TestServer, label: &str, parent_id: Option<NodeId>) -> Node {
    server
        .post("/api/tree")
        .json(&CreateNodeInput {
            label: label.to_string(),
            parent_id,
        })
        .await
        .json::<Node>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_healthy_storage() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "healthy", "storage": "available" }));
    }

    #[tokio::test]
    async fn reports_unavailable_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trees.json");
        let server = setup(&path).await;
        // A directory where the snapshot file should be
        std::fs::create_dir(&path).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        response.assert_json(&json!({ "status": "unhealthy", "storage": "unavailable" }));
    }
}

mod list_trees {
    use super::*;

    #[tokio::test]
    async fn returns_empty_list_when_no_nodes_exist() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server.get("/api/tree").await;

        response.assert_status_ok();
        let trees: Vec<TreeView> = response.json();
        assert!(trees.is_empty());
    }

    #[tokio::test]
    async fn returns_nested_trees() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let root = create_node(&server, "root", None).await;
        let child = create_node(&server, "child", Some(root.id)).await;
        create_node(&server, "grandchild", Some(child.id)).await;
        create_node(&server, "second root", None).await;

        let response = server.get("/api/tree").await;

        response.assert_status_ok();
        response.assert_json(&json!([
            {
                "id": 1,
                "label": "root",
                "children": [
                    {
                        "id": 2,
                        "label": "child",
                        "children": [{ "id": 3, "label": "grandchild", "children": [] }]
                    }
                ]
            },
            { "id": 4, "label": "second root", "children": [] }
        ]));
    }
}

mod create_node {
    use super::*;

    #[tokio::test]
    async fn creates_root_node() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server.post("/api/tree").json(&json!({ "label": "root" })).await;

        response.assert_status(StatusCode::CREATED);
        response.assert_json(&json!({ "id": 1, "label": "root", "parent_id": null }));
    }

    #[tokio::test]
    async fn creates_child_node() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;
        create_node(&server, "root", None).await;

        let response = server
            .post("/api/tree")
            .json(&json!({ "label": "child", "parent_id": 1 }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.assert_json(&json!({ "id": 2, "label": "child", "parent_id": 1 }));
    }

    #[tokio::test]
    async fn returns_not_found_for_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server
            .post("/api/tree")
            .json(&json!({ "label": "orphan", "parent_id": 999 }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let root = create_node(&server, "root", None).await;
        assert_eq!(root.id, 1);
    }

    #[tokio::test]
    async fn rejects_empty_label() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server.post("/api/tree").json(&json!({ "label": "" })).await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let trees: Vec<TreeView> = server.get("/api/tree").await.json();
        assert!(trees.is_empty());
    }

    #[tokio::test]
    async fn rejects_missing_label() {
        let dir = tempfile::tempdir().unwrap();
        let server = setup(&dir.path().join("trees.json")).await;

        let response = server.post("/api/tree").json(&json!({ "parent_id": 1 })).await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trees.json");
        {
            let server = setup(&path).await;
            create_node(&server, "root", None).await;
            create_node(&server, "child", Some(1)).await;
        }

        let server = setup(&path).await;
        let trees: Vec<TreeView> = server.get("/api/tree").await.json();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].children[0].label, "child");

        let next = create_node(&server, "next", None).await;
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn returns_server_error_when_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let server = setup(&data_dir.join("trees.json")).await;
        // A regular file where the data directory should be, so saves fail
        std::fs::write(&data_dir, "").unwrap();

        let response = server
            .post("/api/tree")
            .json(&json!({ "label": "root" }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let trees: Vec<TreeView> = server.get("/api/tree").await.json();
        assert!(trees.is_empty());
    }
}
