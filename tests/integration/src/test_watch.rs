//! Hot reload of a watched configuration file.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use hmacgate_auth::{ValidationResultCode, Validator, sign_request};
    use hmacgate_core::ConfigStore;

    use crate::{init_tracing, test_keys, wait_until};

    const DEBOUNCE: Duration = Duration::from_millis(100);
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn write_config(path: &Path, scheme: &str) {
        let text = format!(
            r#"{{"configurations":[{{"name":"api","authorizationScheme":"{scheme}"}}]}}"#
        );
        std::fs::write(path, text).unwrap();
    }

    fn scheme_of(store: &ConfigStore) -> Option<String> {
        store.get("api").map(|c| c.authorization_scheme)
    }

    #[test]
    fn test_should_apply_reloaded_configuration_to_validation() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        write_config(&path, "V1");

        let store = ConfigStore::with_debounce(DEBOUNCE);
        store.load_from_file_and_watch(&path).unwrap();

        let keys = test_keys();
        let validator = Validator::new(keys.clone());
        let mut request = http::Request::builder()
            .uri("http://api.example.com/ping")
            .header("X-Auth-User", "alice")
            .body(Vec::new())
            .unwrap();
        sign_request(&mut request, &store.get("api").unwrap(), keys.as_ref()).unwrap();
        assert!(validator.validate(&request, &store.get("api").unwrap()).unwrap().is_ok());

        write_config(&path, "V2");
        assert!(wait_until(TIMEOUT, || scheme_of(&store).as_deref() == Some("V2")));

        let result = validator.validate(&request, &store.get("api").unwrap()).unwrap();
        assert_eq!(result.code(), ValidationResultCode::AuthorizationInvalid);
    }

    #[test]
    fn test_should_keep_snapshot_when_watched_file_turns_invalid() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        write_config(&path, "V1");

        let store = ConfigStore::with_debounce(DEBOUNCE);
        store.load_from_file_and_watch(&path).unwrap();

        std::fs::write(&path, "{ not json").unwrap();
        std::thread::sleep(DEBOUNCE * 5);
        assert_eq!(scheme_of(&store).as_deref(), Some("V1"));

        write_config(&path, "V3");
        assert!(wait_until(TIMEOUT, || scheme_of(&store).as_deref() == Some("V3")));
    }

    #[test]
    fn test_should_reload_after_file_is_recreated() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        write_config(&path, "V1");

        let store = ConfigStore::with_debounce(DEBOUNCE);
        store.load_from_file_and_watch(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::thread::sleep(DEBOUNCE * 5);
        assert_eq!(scheme_of(&store).as_deref(), Some("V1"));

        write_config(&path, "V4");
        assert!(wait_until(TIMEOUT, || scheme_of(&store).as_deref() == Some("V4")));
    }

    #[test]
    fn test_should_follow_renamed_file() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        let renamed = dir.path().join("hmac-live.json");
        write_config(&path, "V1");

        let store = ConfigStore::with_debounce(DEBOUNCE);
        store.load_from_file_and_watch(&path).unwrap();

        std::fs::rename(&path, &renamed).unwrap();
        let expected = std::fs::canonicalize(&renamed).unwrap();
        assert!(wait_until(TIMEOUT, || store.watched_path().as_deref() == Some(expected.as_path())));

        write_config(&renamed, "V5");
        assert!(wait_until(TIMEOUT, || scheme_of(&store).as_deref() == Some("V5")));
    }

    #[test]
    fn test_should_replace_previous_watch() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        write_config(&first, "V1");
        write_config(&second, "V2");

        let store = ConfigStore::with_debounce(DEBOUNCE);
        store.load_from_file_and_watch(&first).unwrap();
        store.load_from_file_and_watch(&second).unwrap();
        assert_eq!(scheme_of(&store).as_deref(), Some("V2"));
        assert_eq!(
            store.watched_path(),
            Some(std::fs::canonicalize(&second).unwrap())
        );

        write_config(&first, "stale");
        write_config(&second, "V7");
        assert!(wait_until(TIMEOUT, || scheme_of(&store).as_deref() == Some("V7")));
        std::thread::sleep(DEBOUNCE * 3);
        assert_eq!(scheme_of(&store).as_deref(), Some("V7"));
    }
}
