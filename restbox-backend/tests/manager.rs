mod common;

use std::time::Duration;

use common::TestStorage;
use http::{HeaderValue, Method, header};
use pretty_assertions::assert_eq;
use restbox_backend::{Format, StorageCacheManager, storage_key};
use restbox_core::{
    CacheError, CacheManager, CacheRequest, MatchOptions, StoredResponse,
};

const URL: &str = "https://somewhere/path";

fn response(status: u16, body: &'static str) -> StoredResponse {
    StoredResponse::new(status, URL, body).with_header("content-type", "application/json")
}

#[tokio::test]
async fn put_then_match() {
    let manager = StorageCacheManager::new(TestStorage::new());
    let request = CacheRequest::get(URL);

    assert_eq!(manager.match_request(&request, MatchOptions::new()).await.unwrap(), None);

    let stored = response(200, r#"{"a":1}"#);
    manager.put(&request, stored.clone()).await.unwrap();

    let found = manager.match_request(&request, MatchOptions::new()).await.unwrap();
    assert_eq!(found, Some(stored));
}

#[tokio::test]
async fn put_overwrites_previous_entry() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    let request = CacheRequest::get(URL);

    manager.put(&request, response(200, "first")).await.unwrap();
    manager.put(&request, response(200, "second")).await.unwrap();

    let all = manager
        .bulk()
        .unwrap()
        .match_all(Some(&request), MatchOptions::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].body, "second");
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn each_query_string_gets_its_own_key() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    let first = CacheRequest::get(format!("{URL}?page=1"));
    let second = CacheRequest::get(format!("{URL}?page=2"));
    let third = CacheRequest::get(format!("{URL}?page=3"));

    manager.put(&first, response(200, "1")).await.unwrap();
    manager.put(&second, response(200, "2")).await.unwrap();

    assert_eq!(storage.len(), 2);
    let found = manager.match_request(&second, MatchOptions::new()).await.unwrap();
    assert_eq!(found.map(|r| r.body), Some("2".into()));
    assert!(manager.match_request(&third, MatchOptions::new()).await.unwrap().is_none());

    let relaxed = manager
        .bulk()
        .unwrap()
        .match_all(Some(&third), MatchOptions::new().ignore_search(true))
        .await
        .unwrap();
    assert_eq!(relaxed.len(), 2);
}

#[tokio::test]
async fn ignore_search_does_not_reach_other_paths() {
    let manager = StorageCacheManager::new(TestStorage::new());
    manager
        .put(&CacheRequest::get(format!("{URL}2?page=1")), response(200, "other"))
        .await
        .unwrap();

    let found = manager
        .match_request(&CacheRequest::get(URL), MatchOptions::new().ignore_search(true))
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn only_get_requests_are_stored() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());

    let error = manager
        .put(&CacheRequest::new(Method::HEAD, URL), response(200, ""))
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::UnsupportedMethod(method) if method == "HEAD"));

    let error = manager
        .bulk()
        .unwrap()
        .add_all(vec![
            (CacheRequest::get(format!("{URL}/a")), response(200, "{}")),
            (CacheRequest::new(Method::POST, format!("{URL}/b")), response(200, "{}")),
        ])
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::UnsupportedMethod(_)));
    assert_eq!(storage.len(), 0);
}

#[tokio::test]
async fn head_requests_need_ignore_method() {
    let manager = StorageCacheManager::new(TestStorage::new());
    manager.put(&CacheRequest::get(URL), response(200, "body")).await.unwrap();
    let head = CacheRequest::new(Method::HEAD, URL);

    assert_eq!(manager.match_request(&head, MatchOptions::new()).await.unwrap(), None);
    let found = manager
        .match_request(&head, MatchOptions::new().ignore_method(true))
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.body), Some("body".into()));
}

#[tokio::test]
async fn authorization_requests_are_not_stored() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    let request = CacheRequest::get(URL)
        .with_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer token"));

    manager.put(&request, response(200, "{}")).await.unwrap();

    assert_eq!(storage.len(), 0);
}

#[tokio::test]
async fn custom_uncacheable_headers() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone())
        .uncacheable_request_headers([header::COOKIE]);
    let with_auth = CacheRequest::get(URL)
        .with_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer token"));
    let with_cookie = CacheRequest::get(format!("{URL}/other"))
        .with_header(header::COOKIE, HeaderValue::from_static("a=b"));

    manager.put(&with_auth, response(200, "{}")).await.unwrap();
    manager.put(&with_cookie, response(200, "{}")).await.unwrap();

    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn delete_removes_matching_entries() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    let request = CacheRequest::get(URL);

    assert!(!manager.delete(&request, MatchOptions::new()).await.unwrap());

    manager.put(&request, response(200, "{}")).await.unwrap();
    assert!(manager.delete(&request, MatchOptions::new()).await.unwrap());
    assert_eq!(storage.len(), 0);
    assert!(manager.match_request(&request, MatchOptions::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_with_unsafe_method_needs_ignore_method() {
    let manager = StorageCacheManager::new(TestStorage::new());
    manager.put(&CacheRequest::get(URL), response(200, "{}")).await.unwrap();
    let post = CacheRequest::new(Method::POST, URL);

    assert!(!manager.delete(&post, MatchOptions::new()).await.unwrap());
    assert!(manager.delete(&post, MatchOptions::new().ignore_method(true)).await.unwrap());
}

#[tokio::test]
async fn vary_keeps_separate_variants() {
    let manager = StorageCacheManager::new(TestStorage::new());
    let english = CacheRequest::get(URL)
        .with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
    let german = CacheRequest::get(URL)
        .with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("de"));

    manager
        .put(&english, response(200, "hello").with_header("vary", "accept-language"))
        .await
        .unwrap();
    manager
        .put(&german, response(200, "hallo").with_header("vary", "accept-language"))
        .await
        .unwrap();

    let found = manager.match_request(&german, MatchOptions::new()).await.unwrap();
    assert_eq!(found.map(|r| r.body), Some("hallo".into()));
    let found = manager.match_request(&english, MatchOptions::new()).await.unwrap();
    assert_eq!(found.map(|r| r.body), Some("hello".into()));
    let keys = manager.bulk().unwrap().keys(None, MatchOptions::new()).await.unwrap();
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn ignore_vary_delete_drops_every_variant() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    for language in ["en", "de"] {
        let request = CacheRequest::get(URL)
            .with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static(language));
        manager
            .put(&request, response(200, language).with_header("vary", "accept-language"))
            .await
            .unwrap();
    }
    assert_eq!(storage.len(), 3);

    let post = CacheRequest::new(Method::POST, URL);
    let options = MatchOptions::new().ignore_method(true).ignore_vary(true);
    assert!(manager.delete(&post, options).await.unwrap());
    assert_eq!(storage.len(), 0);
}

#[tokio::test]
async fn add_rejects_unsuccessful_responses() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone());
    let bulk = manager.bulk().unwrap();

    let error = bulk
        .add(&CacheRequest::get(URL), response(404, "{}"))
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::Rejected(404)));

    let error = bulk
        .add_all(vec![
            (CacheRequest::get(format!("{URL}/a")), response(200, "{}")),
            (CacheRequest::get(format!("{URL}/b")), response(500, "{}")),
        ])
        .await
        .unwrap_err();
    assert!(matches!(error, CacheError::Rejected(500)));
    assert_eq!(storage.len(), 0);

    bulk.add_all(vec![
        (CacheRequest::get(format!("{URL}/a")), response(200, "{}")),
        (CacheRequest::get(format!("{URL}/b")), response(201, "{}")),
    ])
    .await
    .unwrap();
    assert_eq!(storage.len(), 2);
}

#[tokio::test]
async fn match_all_without_request_lists_namespace() {
    let storage = TestStorage::new();
    let shop = StorageCacheManager::new(storage.clone()).namespace("shop");
    let other = StorageCacheManager::new(storage.clone()).namespace("other");

    shop.put(&CacheRequest::get(format!("{URL}/1")), response(200, "1")).await.unwrap();
    shop.put(&CacheRequest::get(format!("{URL}/2")), response(200, "2")).await.unwrap();
    other.put(&CacheRequest::get(URL), response(200, "x")).await.unwrap();

    let all = shop.bulk().unwrap().match_all(None, MatchOptions::new()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn ttl_is_passed_to_storage() {
    let storage = TestStorage::new();
    let manager = StorageCacheManager::new(storage.clone()).ttl(Duration::from_secs(60));

    manager.put(&CacheRequest::get(URL), response(200, "{}")).await.unwrap();

    assert_eq!(
        storage.ttl(&storage_key("restbox", &Method::GET, URL)),
        Some(Duration::from_secs(60))
    );
}

#[tokio::test]
async fn bincode_storage_round_trips() {
    let manager = StorageCacheManager::new(TestStorage::with_format(Format::Bincode));
    let request = CacheRequest::get(URL);
    let stored = response(200, r#"{"a":1}"#).with_header("etag", "\"v1\"");

    manager.put(&request, stored.clone()).await.unwrap();

    let found = manager.match_request(&request, MatchOptions::new()).await.unwrap();
    assert_eq!(found, Some(stored));
}

#[test]
fn describe_lists_settings() {
    let manager = StorageCacheManager::new(TestStorage::new());
    let description = manager.describe();

    assert_eq!(description["namespace"], "restbox");
    assert_eq!(description["uncacheableRequestHeaders"][0], "authorization");
    assert_eq!(description["storage"]["name"], "test");
}
