// File: liveframe-core/tests/token_store_tests.rs

use chrono::{Duration, TimeZone, Utc};

use liveframe_core::Error;
use liveframe_core::models::Token;
use liveframe_core::repositories::FileTokenStore;
use liveframe_core::traits::TokenStore;

fn sample_token() -> Token {
    Token {
        access_token: "ya29.sample".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: "1//refresh".to_string(),
        expiry: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
    }
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("token.json"));
    assert!(matches!(store.load(), Err(Error::NotFound(_))));
}

#[test]
fn garbage_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(&path, "not a token").unwrap();
    assert!(matches!(FileTokenStore::new(&path).load(), Err(Error::Decode(_))));
}

#[test]
fn save_creates_missing_directories_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".liveframe").join("token.json");
    let store = FileTokenStore::new(&path);

    store.save(&sample_token()).unwrap();
    assert_eq!(store.load().unwrap(), sample_token());

    // Second save replaces the first in place.
    let mut newer = sample_token();
    newer.access_token = "ya29.newer".to_string();
    newer.expiry = newer.expiry + Duration::hours(1);
    store.save(&newer).unwrap();
    assert_eq!(store.load().unwrap(), newer);

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != "token.json")
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn cache_layout_uses_snake_case_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    FileTokenStore::new(&path).save(&sample_token()).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["access_token"], "ya29.sample");
    assert_eq!(raw["token_type"], "Bearer");
    assert_eq!(raw["refresh_token"], "1//refresh");
    assert!(raw["expiry"].as_str().unwrap().starts_with("2030-01-02T03:04:05"));
}

#[test]
fn reads_cache_written_without_refresh_token() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(
        &path,
        r#"{"access_token":"a","token_type":"Bearer","expiry":"2030-01-02T03:04:05.123456789+01:00"}"#,
    )
    .unwrap();

    let token = FileTokenStore::new(&path).load().unwrap();
    assert_eq!(token.refresh_token, "");
    assert!(!token.is_renewable());
    assert_eq!(token.expiry, Utc.with_ymd_and_hms(2030, 1, 2, 2, 4, 5).unwrap() + Duration::nanoseconds(123456789));
}

#[test]
fn camel_case_cache_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(
        &path,
        r#"{"accessToken":"a","tokenType":"Bearer","refreshToken":"r","expiry":"2030-01-02T03:04:05Z"}"#,
    )
    .unwrap();

    let token = FileTokenStore::new(&path).load().unwrap();
    assert_eq!(token.access_token, "a");
    assert_eq!(token.refresh_token, "r");
}

#[cfg(unix)]
#[test]
fn cache_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("token.json");
    FileTokenStore::new(&path).save(&sample_token()).unwrap();

    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    let dir_mode = std::fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(dir_mode & 0o077, 0);
}
