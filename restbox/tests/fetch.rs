//! End-to-end calls through the fetch dispatcher.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use restbox::{
    BaseClient, CacheError, CacheManager, CacheMode, CacheRequest, CallOptions, ClientDefaults,
    ClientOverrides, Error, FetchOptions, FetchResult, MatchOptions, ParameterError,
    QueryParameters, RetrySettings, StoredResponse, delete, get, patch, post, put,
};
use restbox_core::CacheResult;
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::client;

#[tokio::test]
async fn get_renders_url_from_client_and_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/f_ecom/products/42"))
        .and(query_param("expand", "images,prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &format!("{}/api/{{version}}", server.uri()),
        ClientOverrides::new(),
    );
    let body = get(
        &client,
        CallOptions::new("/organizations/{organizationId}/products/{id}")
            .path_parameter("organizationId", "f_ecom")
            .path_parameter("id", "42")
            .query_parameters(QueryParameters::new().with("expand", ["images", "prices"])),
    )
    .await
    .unwrap()
    .into_body();

    assert_eq!(body, Some(json!({ "id": "42" })));
}

#[tokio::test]
async fn missing_path_parameter_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let error = get(&client, CallOptions::new("/products/{id}"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        Error::Parameter(ParameterError::MissingPathParameter(name)) if name == "id"
    ));
}

#[tokio::test]
async fn empty_successful_body_is_an_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/baskets/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let body = delete(&client, CallOptions::new("/baskets/1"))
        .await
        .unwrap()
        .into_body();

    assert_eq!(body, Some(json!({})));
}

#[tokio::test]
async fn unsuccessful_status_is_a_response_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "title": "Not Found" })))
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let error = get(&client, CallOptions::new("/missing")).await.unwrap_err();

    let Error::Response(error) = error else {
        panic!("expected a response error, got {error:?}");
    };
    assert_eq!(error.status, 404);
    assert_eq!(error.status_text, "Not Found");
    assert_eq!(error.to_string(), "404 Not Found");
    let text = error.response.text().await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["title"], "Not Found");
}

#[tokio::test]
async fn raw_response_is_returned_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let result = get(&client, CallOptions::new("/raw").raw_response(true))
        .await
        .unwrap();

    let FetchResult::Raw(response) = result else {
        panic!("expected a raw response");
    };
    assert_eq!(response.text().await.unwrap(), "plain text");
}

#[tokio::test]
async fn raw_response_still_fails_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let error = get(&client, CallOptions::new("/raw").raw_response(true))
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Response(error) if error.status == 500));
}

#[tokio::test]
async fn json_body_is_serialized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/baskets"))
        .and(body_string(r#"{"currency":"EUR"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "basketId": "b1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let body = post(
        &client,
        CallOptions::new("/baskets").body(json!({ "currency": "EUR" })),
    )
    .await
    .unwrap()
    .into_body();

    assert_eq!(body, Some(json!({ "basketId": "b1" })));
}

#[tokio::test]
async fn form_body_is_url_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("grant_type=client_credentials&channel_id=RefArch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    post(
        &client,
        CallOptions::new("/oauth2/token")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(json!({ "grant_type": "client_credentials", "channel_id": "RefArch" })),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_content_type_sends_text_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(body_string("<basket/>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    put(
        &client,
        CallOptions::new("/baskets/1")
            .header("content-type", "application/xml")
            .body("<basket/>"),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn disabled_transform_sends_text_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(body_string("{\"already\":\"encoded\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    patch(
        &client,
        CallOptions::new("/baskets/1")
            .body("{\"already\":\"encoded\"}")
            .disable_transform_body(true),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn max_age_response_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "mock": "data" }))
                .insert_header("Cache-Control", "max-age=604800"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    let first = get(&client, CallOptions::new("/product")).await.unwrap();
    let second = get(&client, CallOptions::new("/product")).await.unwrap();

    assert_eq!(first.into_body(), Some(json!({ "mock": "data" })));
    assert_eq!(second.into_body(), Some(json!({ "mock": "data" })));
}

#[tokio::test]
async fn max_age_zero_reaches_the_network_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "mock": "first" }))
                .insert_header("Cache-Control", "max-age=0"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "mock": "second" }))
                .insert_header("Cache-Control", "max-age=0"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    get(&client, CallOptions::new("/product")).await.unwrap();
    let second = get(&client, CallOptions::new("/product")).await.unwrap();

    assert_eq!(second.into_body(), Some(json!({ "mock": "second" })));
}

#[tokio::test]
async fn disabled_cache_always_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .insert_header("Cache-Control", "max-age=604800"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new().disable_cache());
    assert!(client.config.cache_manager.is_none());
    get(&client, CallOptions::new("/product")).await.unwrap();
    get(&client, CallOptions::new("/product")).await.unwrap();
}

#[tokio::test]
async fn call_cache_mode_overrides_client_fetch_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .insert_header("Cache-Control", "max-age=604800"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new());
    get(&client, CallOptions::new("/product")).await.unwrap();
    get(
        &client,
        CallOptions::new("/product").fetch_options(FetchOptions {
            cache: Some(CacheMode::Reload),
            ..FetchOptions::default()
        }),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn clients_on_the_same_defaults_share_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "shared": true }))
                .insert_header("Cache-Control", "max-age=604800"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let defaults = ClientDefaults::new();
    let overrides = ClientOverrides::new().base_uri(server.uri());
    let first = BaseClient::with_defaults(&defaults, overrides.clone()).unwrap();
    let second = BaseClient::with_defaults(&defaults, overrides).unwrap();

    get(&first, CallOptions::new("/shared")).await.unwrap();
    let body = get(&second, CallOptions::new("/shared"))
        .await
        .unwrap()
        .into_body();

    assert_eq!(body, Some(json!({ "shared": true })));
}

#[derive(Debug)]
struct FailingManager;

#[async_trait]
impl CacheManager for FailingManager {
    async fn match_request(
        &self,
        _request: &CacheRequest,
        _options: MatchOptions,
    ) -> CacheResult<Option<StoredResponse>> {
        Err(CacheError::store(std::io::Error::other("store is down")))
    }

    async fn put(&self, _request: &CacheRequest, _response: StoredResponse) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _request: &CacheRequest, _options: MatchOptions) -> CacheResult<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn cache_store_errors_are_not_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        ClientOverrides::new().cache_manager(Arc::new(FailingManager)),
    );
    let error = get(&client, CallOptions::new("/product"))
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Cache(_)));
    assert_eq!(error.to_string(), "store is down");
}

#[tokio::test]
async fn client_retry_settings_apply_to_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        ClientOverrides::new().retry_settings(RetrySettings {
            retries: Some(2),
            min_timeout: Some(Duration::from_millis(10)),
            ..RetrySettings::default()
        }),
    );
    let body = get(&client, CallOptions::new("/flaky"))
        .await
        .unwrap()
        .into_body();

    assert_eq!(body, Some(json!({ "ok": true })));
}

#[tokio::test]
async fn timeout_applies_to_each_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(200)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        ClientOverrides::new()
            .retry_settings(RetrySettings {
                retries: Some(1),
                min_timeout: Some(Duration::from_millis(10)),
                ..RetrySettings::default()
            })
            .fetch_options(FetchOptions {
                timeout: Some(Duration::from_millis(300)),
                ..FetchOptions::default()
            }),
    );
    let started = std::time::Instant::now();
    let body = get(&client, CallOptions::new("/slow"))
        .await
        .unwrap()
        .into_body();

    assert_eq!(body, Some(json!({ "ok": true })));
    assert!(started.elapsed() > Duration::from_millis(300));
}

#[tokio::test]
async fn call_retry_settings_override_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        ClientOverrides::new().retry_settings(RetrySettings {
            retries: Some(3),
            min_timeout: Some(Duration::from_millis(10)),
            ..RetrySettings::default()
        }),
    );
    let error = get(
        &client,
        CallOptions::new("/flaky").retry_settings(RetrySettings::with_retries(0)),
    )
    .await
    .unwrap_err();

    assert!(matches!(error, Error::Response(error) if error.status == 503));
}

#[tokio::test]
async fn manual_redirect_returns_the_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server.uri(), ClientOverrides::new().disable_cache());
    let error = get(
        &client,
        CallOptions::new("/old").fetch_options(FetchOptions {
            redirect: Some(restbox::Redirect::Manual),
            ..FetchOptions::default()
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(error, Error::Response(error) if error.status == 301));
}
