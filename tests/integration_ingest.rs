#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ingestion pipeline tests: pages served by a mock site, embeddings by a mock
// OpenAI API, chunks into the in-memory store.
// Run with: cargo test --test integration_ingest

use std::sync::Arc;

use f1_rag::chat::ChatService;
use f1_rag::commands::{Services, prepare_store, resolve_sources, run_ingestion};
use f1_rag::completion::OpenAiChat;
use f1_rag::config::{Config, OpenAiConfig, Secrets, StoreBackend, VectorStoreConfig};
use f1_rag::crawler::BrowserConfig;
use f1_rag::database::{MemoryStore, SimilarityMetric, VectorStore};
use f1_rag::embeddings::OpenAiEmbedder;
use f1_rag::server::{AppState, router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "f1gpt";

fn test_secrets() -> Secrets {
    Secrets {
        astra_token: "AstraCS:unused".to_string(),
        astra_url: "https://unused.apps.astra.datastax.com".to_string(),
        astra_keyspace: "default_keyspace".to_string(),
        collection: COLLECTION.to_string(),
        openai_api_key: "sk-test".to_string(),
    }
}

fn test_config(openai: &MockServer) -> Config {
    Config {
        openai: OpenAiConfig {
            base_url: format!("{}/v1", openai.uri()),
            embedding_dimension: 3,
            ..OpenAiConfig::default()
        },
        vector_store: VectorStoreConfig {
            backend: StoreBackend::Memory,
            ..VectorStoreConfig::default()
        },
        browser: BrowserConfig {
            render_javascript: false,
            ..BrowserConfig::default()
        },
        ..Config::default()
    }
}

fn services(config: &Config, store: &Arc<MemoryStore>) -> Services {
    let embedder =
        OpenAiEmbedder::new(&config.openai, "sk-test").expect("embedder should build");
    Services {
        embedder: Arc::new(embedder),
        store: Arc::clone(store) as Arc<dyn VectorStore>,
    }
}

async fn mock_page(site: &MockServer, route: &str, article: &str) {
    let html = format!(
        "<html><head><script>var tracking = 1;</script></head>\
         <body><nav>Home | Latest | Drivers</nav>\
         <article>\n  <p>{article}</p>\n</article>\
         <footer>© Formula 1</footer></body></html>"
    );
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(site)
        .await;
}

async fn mock_embedding_for(openai: &MockServer, input: &str, embedding: Value) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({ "input": input })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [ { "embedding": embedding } ] })),
        )
        .mount(openai)
        .await;
}

fn page_url(site: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", site.uri(), route)).expect("mock URL is valid")
}

#[tokio::test]
async fn ingested_page_answers_the_question() {
    let site = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_page(&site, "/race", "Lewis Hamilton won the race.").await;
    mock_page(&site, "/team", "Max Verstappen drove a Red Bull.").await;
    mock_embedding_for(&openai, "Lewis Hamilton won the race.", json!([1.0, 0.0, 0.0])).await;
    mock_embedding_for(&openai, "Max Verstappen drove a Red Bull.", json!([0.0, 1.0, 0.0])).await;
    mock_embedding_for(&openai, "Who won the race?", json!([0.9, 0.1, 0.0])).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Lewis Hamilton.\"}}]}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&openai)
        .await;

    let config = test_config(&openai);
    let secrets = test_secrets();
    let store = Arc::new(MemoryStore::new());
    let services = services(&config, &store);

    let report = run_ingestion(
        &config,
        &secrets,
        &services,
        SimilarityMetric::DotProduct,
        &[page_url(&site, "/race"), page_url(&site, "/team")],
    )
    .await
    .expect("ingestion should succeed");
    assert_eq!(report.pages, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(store.len(COLLECTION).await, Some(2));

    let model = OpenAiChat::new(&config.openai, "sk-test").expect("chat client should build");
    let chat = ChatService::new(
        services.embedder,
        services.store,
        Arc::new(model),
        COLLECTION,
        config.vector_store.top_k,
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind an ephemeral port");
    let addr = listener.local_addr().expect("listener has an address");
    let app = router(Arc::new(AppState::new(config, chat)));
    tokio::spawn(async move { axum::serve(listener, app).await });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({ "messages": [ { "role": "user", "content": "Who won the race?" } ] }))
        .send()
        .await
        .expect("server should answer");
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("stream should complete");
    assert!(body.starts_with("0:\"Lewis Hamilton.\"\n"));

    let completion: Value = openai
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/v1/chat/completions")
        .find_map(|r| serde_json::from_slice(&r.body).ok())
        .expect("one completion request was made");
    let prompt = completion["messages"][0]["content"]
        .as_str()
        .expect("system prompt is a string");
    assert!(prompt.contains("Lewis Hamilton won the race."));
    // nearest chunk comes first in the context
    assert!(prompt.contains("Context:\nLewis Hamilton won the race.\n\nMax Verstappen drove a Red Bull."));
}

#[tokio::test]
async fn ingesting_twice_reuses_the_collection() {
    let site = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_page(&site, "/race", "Lewis Hamilton won the race.").await;
    mock_embedding_for(&openai, "Lewis Hamilton won the race.", json!([1.0, 0.0, 0.0])).await;

    let config = test_config(&openai);
    let secrets = test_secrets();
    let store = Arc::new(MemoryStore::new());
    let services = services(&config, &store);
    let urls = [page_url(&site, "/race")];

    run_ingestion(&config, &secrets, &services, SimilarityMetric::DotProduct, &urls)
        .await
        .expect("first run should succeed");
    run_ingestion(&config, &secrets, &services, SimilarityMetric::Cosine, &urls)
        .await
        .expect("second run should succeed");

    let collections = store.list_collections().await.expect("list should succeed");
    assert_eq!(collections.len(), 1);
    let options = collections[0].vector.expect("collection is a vector collection");
    assert_eq!(options.metric, SimilarityMetric::DotProduct);
    assert_eq!(options.dimension, 3);
    // records are appended, never replaced
    assert_eq!(store.len(COLLECTION).await, Some(2));
}

#[tokio::test]
async fn failed_page_aborts_the_run() {
    let site = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_page(&site, "/race", "Lewis Hamilton won the race.").await;
    mock_embedding_for(&openai, "Lewis Hamilton won the race.", json!([1.0, 0.0, 0.0])).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;

    let config = test_config(&openai);
    let secrets = test_secrets();
    let store = Arc::new(MemoryStore::new());
    let services = services(&config, &store);

    let result = run_ingestion(
        &config,
        &secrets,
        &services,
        SimilarityMetric::DotProduct,
        &[page_url(&site, "/race"), page_url(&site, "/missing")],
    )
    .await;

    let error = result.expect_err("the 404 page should abort the run");
    assert!(format!("{error:#}").contains("404"));
    // the first page stays ingested
    assert_eq!(store.len(COLLECTION).await, Some(1));
}

#[tokio::test]
async fn missing_embedding_aborts_the_run() {
    let site = MockServer::start().await;
    let openai = MockServer::start().await;
    mock_page(&site, "/race", "Lewis Hamilton won the race.").await;
    mock_embedding_for(&openai, "Lewis Hamilton won the race.", json!([])).await;

    let config = test_config(&openai);
    let store = Arc::new(MemoryStore::new());
    let services = services(&config, &store);

    let result = run_ingestion(
        &config,
        &test_secrets(),
        &services,
        SimilarityMetric::DotProduct,
        &[page_url(&site, "/race")],
    )
    .await;

    assert!(result.is_err());
    assert_eq!(store.len(COLLECTION).await, Some(0));
}

#[tokio::test]
async fn unseeded_memory_store_answers_without_context() {
    let openai = MockServer::start().await;
    mock_embedding_for(&openai, "Who won the race?", json!([0.9, 0.1, 0.0])).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"No idea.\"}}]}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&openai)
        .await;

    let config = test_config(&openai);
    let secrets = test_secrets();
    let store = Arc::new(MemoryStore::new());
    let services = services(&config, &store);

    prepare_store(&config, &secrets, &services)
        .await
        .expect("memory collection should be provisioned");
    prepare_store(&config, &secrets, &services)
        .await
        .expect("provisioning again is a no-op");
    assert_eq!(store.len(COLLECTION).await, Some(0));
    let collections = store.list_collections().await.expect("list should succeed");
    assert_eq!(collections.len(), 1);
    let options = collections[0].vector.expect("collection is a vector collection");
    assert_eq!(options.dimension, 3);
    assert_eq!(options.metric, SimilarityMetric::DotProduct);

    let model = OpenAiChat::new(&config.openai, "sk-test").expect("chat client should build");
    let chat = ChatService::new(
        services.embedder,
        services.store,
        Arc::new(model),
        COLLECTION,
        config.vector_store.top_k,
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind an ephemeral port");
    let addr = listener.local_addr().expect("listener has an address");
    let app = router(Arc::new(AppState::new(config, chat)));
    tokio::spawn(async move { axum::serve(listener, app).await });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({ "messages": [ { "role": "user", "content": "Who won the race?" } ] }))
        .send()
        .await
        .expect("server should answer");
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("stream should complete");
    assert_eq!(body, "0:\"No idea.\"\nd:{\"finishReason\":\"stop\"}\n");
}

#[test]
fn command_line_urls_override_configured_sources() {
    let config = Config::default();

    let configured = resolve_sources(&config, &[]).expect("default sources are valid");
    assert_eq!(configured.len(), 2);

    let given = resolve_sources(&config, &["https://example.com/f1".to_string()])
        .expect("URL is valid");
    assert_eq!(given, vec![Url::parse("https://example.com/f1").expect("valid URL")]);

    assert!(resolve_sources(&config, &["not a url".to_string()]).is_err());
}
