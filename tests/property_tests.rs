//! Property tests for the proxy's filtering and routing invariants.

use std::time::Duration;

use pulse_bff::auth::{sign_session, SessionClaims, SignedSessionValidator};
use pulse_bff::http::request::Method;
use pulse_bff::proxy::headers::{filter_response_headers, RESPONSE_HEADER_ALLOW_LIST};
use pulse_bff::proxy::policy::{
    backend_path, classify, is_excluded, route_segments, ProxyDecision, ALLOWED_METHODS,
};
use pulse_bff::proxy::{BackendForwarder, TargetError};
use proptest::prelude::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::SecretString;
use url::Url;

fn forwarder() -> BackendForwarder {
    BackendForwarder::new(Url::parse("https://api.pulsebiz.io").unwrap(), Duration::from_secs(30)).unwrap()
}

// Strategy: header names, biased towards ones the filter knows about
fn arb_header_name() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(RESPONSE_HEADER_ALLOW_LIST).prop_map(|name| name.to_string()),
        Just("server".to_string()),
        Just("set-cookie".to_string()),
        Just("x-internal-trace".to_string()),
        prop::string::string_regex("[a-z][a-z0-9-]{0,15}").unwrap(),
    ]
}

// Strategy: any method token the parser would accept
fn arb_method() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::GET),
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::PATCH),
        Just(Method::DELETE),
        Just(Method::HEAD),
        Just(Method::OPTIONS),
        prop::string::string_regex("[A-Z]{3,10}")
            .unwrap()
            .prop_map(|token| Method::from_token(&token).unwrap_or(Method::GET)),
    ]
}

// Strategy: request paths, some under the API root
fn arb_path() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        Just(".".to_string()),
        Just("..".to_string()),
        Just("%2e%2E".to_string()),
        Just("auth".to_string()),
        Just("google".to_string()),
        prop::string::string_regex("[A-Za-z0-9._%-]{0,8}").unwrap(),
    ];
    (
        prop_oneof![Just("/api/v1/"), Just("/api/v2/"), Just("/")],
        prop::collection::vec(segment, 0..5),
    )
        .prop_map(|(root, segments)| format!("{root}{}", segments.join("/")))
}

// Strategy: segment spellings a browser or a hostile client might send,
// including the ones `url` rewrites on parse
fn arb_segment_spelling() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just("%2e".to_string()),
        Just("%2E%2e".to_string()),
        Just(".%2e".to_string()),
        Just("a%5C..".to_string()),
        Just("auth\\google".to_string()),
        prop::string::string_regex(r#"[A-Za-z0-9._~%'!$&()*+,;=:@\\\t ^`{}"<>|-]{1,8}"#).unwrap(),
        prop::string::string_regex("(%[0-9a-fA-F]{2}|[a-z.]){1,6}").unwrap(),
    ]
}

proptest! {
    /// Property: only allow-listed headers ever reach the browser
    #[test]
    fn proptest_filter_emits_only_allow_listed_headers(
        headers in prop::collection::vec(
            (arb_header_name(), prop::string::string_regex("[ -~]{0,20}").unwrap()),
            0..12,
        )
    ) {
        let mut backend = HeaderMap::new();
        for (name, value) in &headers {
            backend.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        let filtered = filter_response_headers(&backend);

        for (name, value) in &filtered {
            prop_assert!(RESPONSE_HEADER_ALLOW_LIST.contains(&name.as_str()), "leaked {name}");
            prop_assert!(!value.is_empty());
        }
    }

    /// Property: nothing outside the allowed methods is ever forwarded
    #[test]
    fn proptest_classify_respects_method_and_exclusion(
        method in arb_method(),
        path in arb_path(),
    ) {
        let Some(segments) = route_segments(&path) else {
            return Ok(());
        };
        prop_assert!(!segments.is_empty());

        match classify(&method, &segments) {
            ProxyDecision::Allowed(backend_path) => {
                prop_assert!(ALLOWED_METHODS.contains(&method));
                prop_assert!(!is_excluded(&backend_path));
                prop_assert!(backend_path.starts_with("/api/v1/"));
            }
            ProxyDecision::MethodNotAllowed => prop_assert!(!ALLOWED_METHODS.contains(&method)),
            ProxyDecision::PathExcluded => prop_assert!(ALLOWED_METHODS.contains(&method)),
        }
    }

    /// Property: routed segments never step outside the API root
    #[test]
    fn proptest_route_segments_has_no_dot_segments(path in arb_path()) {
        if let Some(segments) = route_segments(&path) {
            for segment in segments {
                prop_assert!(!segment.is_empty());
                prop_assert!(segment != "." && segment != "..");
                prop_assert!(!segment.eq_ignore_ascii_case("%2e%2e"));
            }
        }
    }

    /// Property: whatever routing accepts reaches the backend unchanged
    #[test]
    fn proptest_accepted_paths_reach_backend_verbatim(
        segments in prop::collection::vec(arb_segment_spelling(), 1..5),
    ) {
        let path = format!("/api/v1/{}", segments.join("/"));
        let Some(routed) = route_segments(&path) else {
            return Ok(());
        };
        let expected = backend_path(&routed);

        match forwarder().backend_url(&expected, None) {
            Ok(url) => prop_assert_eq!(url.path(), expected.as_str()),
            Err(e) => prop_assert!(false, "{path:?} accepted but not forwardable: {e}"),
        }
    }

    /// Property: a query is forwarded byte-for-byte or not at all
    #[test]
    fn proptest_query_is_verbatim_or_refused(
        query in prop::string::string_regex("[ -~]{1,16}").unwrap(),
    ) {
        match forwarder().backend_url("/api/v1/search", Some(&query)) {
            Ok(url) => prop_assert_eq!(url.query(), Some(query.as_str())),
            Err(e) => prop_assert!(matches!(e, TargetError::Rewritten), "{e}"),
        }
    }

    /// Property: a token signed with another secret never verifies
    #[test]
    fn proptest_foreign_secret_never_verifies(
        secret in prop::string::string_regex("[A-Za-z0-9]{8,32}").unwrap(),
        email in prop::string::string_regex("[a-z]{1,10}@[a-z]{1,10}\\.com").unwrap(),
    ) {
        let validator = SignedSessionValidator::new(SecretString::from("the-real-secret"));
        prop_assume!(secret != "the-real-secret");

        let claims = SessionClaims {
            sub: None,
            email: Some(email),
            name: None,
            exp: u64::MAX,
        };
        let token = sign_session(&secret, &claims).unwrap();

        prop_assert!(validator.verify(&token, 0).is_err());
    }
}
