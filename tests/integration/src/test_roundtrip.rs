//! Sign on the client, validate on the server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{TimeDelta, TimeZone, Utc};
    use hmacgate_auth::{
        SingleKeyRepository, ValidationResultCode, Validator, sign_request, sign_request_at,
        unauthorized_response,
    };
    use hmacgate_core::{CharacterEncoding, Configuration};

    use crate::{init_tracing, test_keys};

    /// Re-create a signed client request the way a server sees it: an
    /// origin-form target plus a `Host` header.
    fn as_received(request: &http::Request<Vec<u8>>) -> http::Request<Vec<u8>> {
        let uri = request.uri();
        let mut builder = http::Request::builder()
            .method(request.method().clone())
            .uri(uri.path_and_query().map_or("/", |pq| pq.as_str()));
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(authority) = uri.authority() {
            builder = builder.header(http::header::HOST, authority.as_str());
        }
        builder.body(request.body().clone()).unwrap()
    }

    fn client_request(body: &[u8]) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method("POST")
            .uri("http://api.example.com/orders?expand=items")
            .header("Content-Type", "application/json")
            .header("X-Auth-User", "alice")
            .header("X-Request-Id", "req-42")
            .body(body.to_vec())
            .unwrap()
    }

    fn config() -> Configuration {
        Configuration::builder()
            .name("orders".to_owned())
            .hmac_algorithm("HMACSHA256".to_owned())
            .headers(vec!["X-Request-Id".to_owned()])
            .build()
    }

    #[test]
    fn test_should_validate_request_signed_by_client() {
        init_tracing();
        let keys = test_keys();
        let config = config();

        let mut request = client_request(br#"{"sku":"A-1","qty":2}"#);
        sign_request(&mut request, &config, keys.as_ref()).unwrap();

        let server_side = as_received(&request);
        let result = Validator::new(keys).validate(&server_side, &config).unwrap();
        assert!(result.is_ok(), "unexpected result: {result}");
    }

    #[test]
    fn test_should_produce_pinned_signature_for_example_request() {
        init_tracing();
        let config = Configuration::builder()
            .headers(vec![
                "X-Custom-Test-Header-1".to_owned(),
                "X-Custom-Test-Header-2".to_owned(),
            ])
            .build();
        let date = Utc.with_ymd_and_hms(2015, 12, 30, 12, 30, 45).unwrap();
        let mut request = http::Request::builder()
            .method("POST")
            .uri("http://www.example.website/test.json")
            .header("Content-Type", "application/json")
            .header("X-Auth-User", "TestUser")
            .header("X-Custom-Test-Header-2", "Test2")
            .header("X-Custom-Test-Header-1", "Test1")
            .body(br#"{"Example":"Value"}"#.to_vec())
            .unwrap();

        let signature = sign_request_at(&mut request, &config, test_keys().as_ref(), date).unwrap();
        assert_eq!(
            signature,
            "ZNIcDaGKZE45U24feUeaO6pZ9e7K/E1IDBf5/uktt8A3Y4Rl6nle9h0KxP1IRJGBiFZjMegci1Ya58prv/vH6Q=="
        );

        let validator = Validator::new(test_keys());
        let at_edge = date + TimeDelta::minutes(5);
        assert!(validator.validate_at(&request, &config, at_edge).unwrap().is_ok());
        assert_eq!(
            validator
                .validate_at(&request, &config, at_edge + TimeDelta::seconds(1))
                .unwrap()
                .code(),
            ValidationResultCode::DateInvalid
        );
    }

    #[test]
    fn test_should_reject_request_validated_under_other_configuration() {
        init_tracing();
        let keys = test_keys();
        let mut request = client_request(b"{}");
        sign_request(&mut request, &config(), keys.as_ref()).unwrap();

        let mut other = config();
        other.character_encoding = Some(CharacterEncoding::Utf16Le);
        let result = Validator::new(keys)
            .validate(&as_received(&request), &other)
            .unwrap();
        assert_eq!(result.code(), ValidationResultCode::SignatureMismatch);

        let response = unauthorized_response("HMAC").unwrap();
        assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_should_sign_without_username_using_single_key() {
        init_tracing();
        let config = Configuration::builder()
            .user_header_name(None)
            .sign_request_uri(false)
            .build();
        let keys = Arc::new(SingleKeyRepository::new("shared-secret"));

        let mut request = http::Request::builder()
            .method("DELETE")
            .uri("http://api.example.com/orders/7")
            .body(Vec::new())
            .unwrap();
        sign_request(&mut request, &config, keys.as_ref()).unwrap();

        // The URI is not signed, so rewriting it keeps the signature valid.
        *request.uri_mut() = "http://api.example.com/orders/8".parse().unwrap();
        let result = Validator::new(keys).validate(&request, &config).unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_should_validate_concurrently() {
        init_tracing();
        let keys = test_keys();
        let validator = Validator::new(keys.clone());
        let config = Arc::new(config());

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let keys = keys.clone();
                let validator = validator.clone();
                let config = Arc::clone(&config);
                thread::spawn(move || {
                    for n in 0..50 {
                        let body = format!(r#"{{"worker":{i},"n":{n}}}"#);
                        let mut request = client_request(body.as_bytes());
                        sign_request(&mut request, &config, keys.as_ref()).unwrap();
                        let result = validator.validate(&request, &config).unwrap();
                        assert!(result.is_ok(), "worker {i} request {n}: {result}");
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    }
}
