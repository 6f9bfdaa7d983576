mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{as_sources, init_test_logger, ScriptedSource};
use wayfare::api::{create_router, AppState};
use wayfare::config::Config;
use wayfare::llm::LlmProvider;
use wayfare::models::Provider;
use wayfare::providers::SourceSet;

fn app(sources: &[Arc<ScriptedSource>], api_keys: Vec<String>) -> axum::Router {
    init_test_logger();
    let mut config = Config::default();
    config.server.api_keys = api_keys;
    let sources = SourceSet {
        places: as_sources(sources),
        weather: None,
    };
    create_router(AppState::new(
        config,
        sources,
        LlmProvider::unavailable("test"),
    ))
}

fn post(uri: &str, body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn flore_request() -> Value {
    json!({
        "concepts": [
            {
                "name": "Café de Flore",
                "category": "cafe",
                "location": {
                    "city": "Paris",
                    "coordinates": {"lat": 48.8541, "lng": 2.3326}
                },
                "context": {"dayNumber": 2, "timeOfDay": "morning"}
            },
            {
                "name": "Gare du Nord",
                "category": "transport",
                "location": {"city": "Paris"}
            }
        ],
        "options": {"useAi": false}
    })
}

#[tokio::test]
async fn consolidate_returns_ordered_envelope() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, 48.8541, 2.3326));
    let yelp = Arc::new(ScriptedSource::new(Provider::Yelp, 48.8542, 2.3328));
    let app = app(&[google, yelp], vec!["secret".into()]);

    let response = app
        .oneshot(post(
            "/api/v1/suggestions:consolidate",
            flore_request(),
            Some("secret"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("error").is_none());

    let results = json["data"]["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);

    assert_eq!(results[0]["status"], "resolved");
    assert_eq!(results[0]["cacheHit"], false);
    let place = &results[0]["place"];
    assert_eq!(place["canonicalName"], "Café de Flore");
    assert_eq!(place["category"], "cafe");
    assert_eq!(place["sources"].as_array().map(Vec::len), Some(2));
    assert_eq!(place["suggestionContext"]["dayNumber"], 2);
    assert!(place["dataQuality"]["overall"].as_f64().is_some());

    // Transport routes to Amadeus only, which is not configured here.
    assert_eq!(results[1]["status"], "unresolved");
    assert_eq!(results[1]["conceptName"], "Gare du Nord");
    assert_eq!(results[1]["reason"], "no_providers_configured");

    let summary = &json["data"]["summary"];
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["resolved"], 1);
    assert_eq!(summary["unresolved"], 1);
    assert_eq!(summary["providersQueried"], json!(["google", "yelp"]));
}

#[tokio::test]
async fn all_providers_down_is_service_unavailable() {
    let google = Arc::new(
        ScriptedSource::new(Provider::Google, 48.8541, 2.3326).failing_for("Café de Flore"),
    );
    let app = app(&[google], Vec::new());

    let response = app
        .oneshot(post(
            "/api/v1/suggestions:consolidate",
            json!({"concepts": [{"name": "Café de Flore", "category": "cafe"}]}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "service_unavailable");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn invalid_concept_reports_field_path() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, 48.8541, 2.3326));
    let app = app(&[google.clone()], Vec::new());

    let response = app
        .oneshot(post(
            "/api/v1/suggestions:consolidate",
            json!({"concepts": [
                {"name": "Café de Flore", "category": "cafe"},
                {"name": "   ", "category": "cafe"}
            ]}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_request");
    assert_eq!(json["error"]["details"][0]["field"], "concepts[1].name");
    assert_eq!(google.calls(), 0);
}

#[tokio::test]
async fn health_lists_configured_providers() {
    let google = Arc::new(ScriptedSource::new(Provider::Google, 48.8541, 2.3326));
    let app = app(&[google], Vec::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["cache"]["enabled"], true);
    let providers = json["data"]["providers"].as_array().expect("providers");
    let status_of = |name: &str| {
        providers
            .iter()
            .find(|p| p["provider"] == name)
            .map(|p| p["status"].clone())
    };
    assert_eq!(status_of("google"), Some(json!("configured")));
    assert_eq!(status_of("amadeus"), Some(json!("disabled")));
}
