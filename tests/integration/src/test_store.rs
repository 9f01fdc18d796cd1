//! Validation driven by configurations served from a `ConfigStore`.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use hmacgate_auth::{ValidationResultCode, Validator, sign_request};
    use hmacgate_core::{ConfigError, ConfigFormat, ConfigStore, DEFAULT_CONFIGURATION_NAME};

    use crate::{init_tracing, test_keys};

    const XML_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<hmacAuthentication>
  <configuration>
    <name>partners</name>
    <userHeaderName>X-Partner</userHeaderName>
    <authorizationScheme>PARTNER</authorizationScheme>
    <signatureDataSeparator>|</signatureDataSeparator>
    <characterEncoding>utf-16le</characterEncoding>
    <hmacAlgorithm>HMACSHA384</hmacAlgorithm>
    <headers>
      <header>X-Trace</header>
    </headers>
  </configuration>
</hmacAuthentication>"#;

    fn request(user_header: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method("PUT")
            .uri("http://partners.example.com/v1/feeds/3")
            .header(user_header, "alice")
            .header("X-Trace", "abc   def")
            .body(b"feed".to_vec())
            .unwrap()
    }

    #[test]
    fn test_should_validate_with_configuration_loaded_from_xml_file() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.xml");
        std::fs::write(&path, XML_CONFIG).unwrap();

        let store = ConfigStore::new();
        store.load_from_file(&path).unwrap();
        assert_eq!(
            store.names(),
            vec![DEFAULT_CONFIGURATION_NAME.to_owned(), "partners".to_owned()]
        );

        let config = store.get("partners").unwrap();
        let keys = test_keys();
        let mut request = request("X-Partner");
        sign_request(&mut request, &config, keys.as_ref()).unwrap();
        assert!(
            request.headers()["authorization"]
                .to_str()
                .unwrap()
                .starts_with("PARTNER ")
        );

        let validator = Validator::new(keys);
        assert!(validator.validate(&request, &config).unwrap().is_ok());

        // The synthesized default expects another scheme and user header.
        let result = validator
            .validate(&request, &store.get_default())
            .unwrap();
        assert_eq!(result.code(), ValidationResultCode::UsernameMissing);
    }

    #[test]
    fn test_should_keep_validating_after_rejected_reload() {
        init_tracing();
        let store = ConfigStore::new();
        let errors: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&errors);
        store.set_error_handler(move |e: &ConfigError| {
            sink.lock().unwrap().push(e.to_string());
        });

        store
            .load_from_str(
                r#"{"configurations":[{"name":"api","hmacAlgorithm":"HMACSHA1"}]}"#,
                ConfigFormat::Json,
            )
            .unwrap();
        let keys = test_keys();
        let mut request = request("X-Auth-User");
        sign_request(&mut request, &store.get("api").unwrap(), keys.as_ref()).unwrap();

        let rejected = store.load_from_str(
            r#"{"configurations":[{"name":"api"},{"name":"api"}]}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(rejected, Err(ConfigError::DuplicateName(_))));
        assert_eq!(errors.lock().unwrap().len(), 1);

        let config = store.get("api").unwrap();
        assert_eq!(config.hmac_algorithm, "HMACSHA1");
        assert!(Validator::new(keys).validate(&request, &config).unwrap().is_ok());
    }

    #[test]
    fn test_should_surface_unknown_algorithm_as_configuration_error() {
        init_tracing();
        let store = ConfigStore::new();
        store
            .load_from_str(
                r#"{"configurations":[{"name":"broken","hmacAlgorithm":"HMACSHA999"}]}"#,
                ConfigFormat::Json,
            )
            .unwrap();

        let keys = test_keys();
        let mut request = request("X-Auth-User");
        let config = store.get("broken").unwrap();
        let err = sign_request(&mut request, &config, keys.as_ref()).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
