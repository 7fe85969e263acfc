use axum::http::StatusCode;
use axum_test::TestServer;
use redactor_services::{
    attachments::MockAttachmentStore,
    config::Config,
    qiniu::MockQiniuUploader,
    routes,
    upload::UploadActions,
};

fn app(store: MockAttachmentStore) -> axum::Router {
    let config = Config::new_for_test();
    let actions = UploadActions::from_config(&config, MockQiniuUploader::new()).unwrap();
    routes(store, actions, config)
}

#[tokio::test]
async fn test_health_check_integration() {
    // Case 1: Connected
    let server_connected = TestServer::new(app(MockAttachmentStore::new())).unwrap();

    let response = server_connected.get("/is-health").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");
    assert_eq!(response.header("x-service-env"), "test");
    let version = response.header("x-service-version");
    assert!(version.to_str().unwrap().starts_with("test:"));

    // Case 2: Disconnected
    let server_disconnected = TestServer::new(app(MockAttachmentStore::disconnected())).unwrap();

    let response = server_disconnected.get("/is-health").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_unknown_path_falls_through() {
    let server = TestServer::new(app(MockAttachmentStore::new())).unwrap();

    let response = server.get("/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_text("nothing to see here");
}

#[tokio::test]
async fn test_qiniu_route_absent_without_credentials() {
    let server = TestServer::new(app(MockAttachmentStore::new())).unwrap();

    let response = server.post("/redactor/upload/qiniu").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
