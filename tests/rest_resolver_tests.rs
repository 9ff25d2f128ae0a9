/// REST resolver client tests against a mock resolver
use identity_engine::{
    crypto::Seed,
    identity::{
        parse_resolver_address, DidDocument, DocumentBuilder, Identity, ResolverClient,
        RestResolverClient, RestResolverConfig, SubjectType,
    },
    IdentityError,
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn document() -> DidDocument {
    let identity = Identity::derive(
        SubjectType::Twin,
        &Seed::generate(),
        "#twin-key-0",
        "#twin-0",
        None,
    )
    .unwrap();
    DocumentBuilder::build(&identity, &[]).unwrap()
}

fn client() -> RestResolverClient {
    RestResolverClient::new(RestResolverConfig {
        timeout: Duration::from_millis(500),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_register_posts_document_and_override_flag() {
    let server = MockServer::start().await;
    let doc = document();

    Mock::given(method("POST"))
        .and(path("/1.0/register"))
        .and(body_partial_json(json!({ "override": true, "document": { "id": doc.id } })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    let did = client().register(&resolver, &doc, true).await.unwrap();
    assert_eq!(did, doc.id);
}

#[tokio::test]
async fn test_fetch_returns_document() {
    let server = MockServer::start().await;
    let doc = document();

    Mock::given(method("GET"))
        .and(path(format!("/1.0/discover/{}", doc.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&doc))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    let fetched = client().fetch(&resolver, &doc.id).await.unwrap();
    assert_eq!(fetched, doc);
}

#[tokio::test]
async fn test_update_puts_document() {
    let server = MockServer::start().await;
    let doc = document();

    Mock::given(method("PUT"))
        .and(path(format!("/1.0/discover/{}", doc.id)))
        .and(body_partial_json(json!({ "id": doc.id, "subjectType": "twin" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    client().update(&resolver, &doc.id, &doc).await.unwrap();
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    let doc = document();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    let client = client();

    assert!(matches!(
        client.fetch(&resolver, &doc.id).await,
        Err(IdentityError::NotFound(_))
    ));
    assert!(matches!(
        client.register(&resolver, &doc, false).await,
        Err(IdentityError::Conflict(_))
    ));
    assert!(matches!(
        client.update(&resolver, &doc.id, &doc).await,
        Err(IdentityError::Resolver(_))
    ));
}

#[tokio::test]
async fn test_malformed_document_is_resolver_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    assert!(matches!(
        client().fetch(&resolver, "did:iotics:iotABC").await,
        Err(IdentityError::Resolver(_))
    ));
}

#[tokio::test]
async fn test_timeout_is_unreachable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let resolver = parse_resolver_address(&server.uri()).unwrap();
    assert!(matches!(
        client().fetch(&resolver, "did:iotics:iotABC").await,
        Err(IdentityError::Unreachable(_))
    ));
}
