use movies_e2e_tests::launch_server;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_health() {
    let server = launch_server("server_health").await.unwrap();

    let response = server
        .anonymous()
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
#[traced_test]
async fn test_api_docs() {
    let server = launch_server("server_api_docs").await.unwrap();

    let response = server
        .anonymous()
        .get(server.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let docs: serde_json::Value = response.json().await.unwrap();
    let paths = docs["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/movies"));
    assert!(paths.contains_key("/api/movies/{id}/ratings"));
    assert!(paths.contains_key("/api/ratings/me"));
}
