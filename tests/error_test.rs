mod common;

use acmekit::prelude::*;
use common::{MockAcmeServer, ScriptedResponse, ScriptedServer, directory_response};
use jiff::Timestamp;
use serde_json::json;
use url::Url;

fn order_one_domain(session: &Session) -> Result<Order> {
    let login = session.login(
        Url::parse("https://ca.invalid/acct/1").unwrap(),
        KeyPair::generate_p256()?,
    );
    login.account().new_order().domain("example.com")?.create()
}

/// Scenario: a rateLimited problem carries the retry instant and the
/// documentation links.
#[test]
fn test_rate_limited_error() {
    let mut mock_server = MockAcmeServer::new();
    let _directory = mock_server.mock_directory();
    let _nonce = mock_server.mock_new_nonce();
    let _new_order = mock_server
        .server
        .mock("POST", "/new-order")
        .with_status(429)
        .with_header("content-type", "application/problem+json")
        .with_header("retry-after", "120")
        .with_header(
            "link",
            "<https://ca.example/docs/rate-limits>; rel=\"urn:ietf:params:acme:documentation\"",
        )
        .with_body(
            json!({
                "type": "urn:ietf:params:acme:error:rateLimited",
                "detail": "too many new orders"
            })
            .to_string(),
        )
        .create();

    let session = Session::new(&mock_server.directory_url()).unwrap();
    let err = order_one_domain(&session).unwrap_err();
    match err {
        AcmeError::Server(ServerError::RateLimited {
            retry_after,
            documents,
            problem,
        }) => {
            let delta = retry_after
                .expect("retry instant is set")
                .duration_since(Timestamp::now())
                .as_secs();
            assert!((118..=122).contains(&delta), "unexpected delta {delta}");
            assert_eq!(
                documents,
                [Url::parse("https://ca.example/docs/rate-limits").unwrap()]
            );
            assert_eq!(problem.detail.as_deref(), Some("too many new orders"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unauthorized_error() {
    let mut mock_server = MockAcmeServer::new();
    let _directory = mock_server.mock_directory();
    let _nonce = mock_server.mock_new_nonce();
    let _new_order = mock_server
        .server
        .mock("POST", "/new-order")
        .with_status(403)
        .with_header("content-type", "application/problem+json")
        .with_body(
            json!({
                "type": "urn:ietf:params:acme:error:unauthorized",
                "detail": "account is not allowed to order"
            })
            .to_string(),
        )
        .create();

    let session = Session::new(&mock_server.directory_url()).unwrap();
    let err = order_one_domain(&session).unwrap_err();
    assert!(matches!(
        err,
        AcmeError::Server(ServerError::Unauthorized(problem))
            if problem.detail.as_deref() == Some("account is not allowed to order")
    ));
}

#[test]
fn test_user_action_required_error_carries_tos_link() {
    let mut mock_server = MockAcmeServer::new();
    let _directory = mock_server.mock_directory();
    let _nonce = mock_server.mock_new_nonce();
    let _new_order = mock_server
        .server
        .mock("POST", "/new-order")
        .with_status(403)
        .with_header("content-type", "application/problem+json")
        .with_header("link", "<https://ca.example/tos-v2>; rel=\"terms-of-service\"")
        .with_body(
            json!({
                "type": "urn:ietf:params:acme:error:userActionRequired",
                "detail": "the terms of service have changed"
            })
            .to_string(),
        )
        .create();

    let session = Session::new(&mock_server.directory_url()).unwrap();
    let err = order_one_domain(&session).unwrap_err();
    match err {
        AcmeError::Server(ServerError::UserActionRequired { tos, problem }) => {
            assert_eq!(tos.unwrap().as_str(), "https://ca.example/tos-v2");
            assert_eq!(problem.detail.as_deref(), Some("the terms of service have changed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// The bad-nonce replay gives up after ten signed attempts and surfaces
/// the problem.
#[test]
fn test_bad_nonce_retry_is_bounded() {
    let server = ScriptedServer::start(|base| {
        let mut responses = vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("head-nonce"),
        ];
        for i in 0..10 {
            responses.push(
                ScriptedResponse::new(400)
                    .nonce(&format!("retry-nonce-{i}"))
                    .problem(json!({
                        "type": "urn:ietf:params:acme:error:badNonce",
                        "detail": "still stale"
                    })),
            );
        }
        responses
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let err = AccountBuilder::new()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .agree_to_terms_of_service()
        .create(&session)
        .unwrap_err();
    assert!(matches!(
        err,
        AcmeError::Server(ServerError::BadNonce(_))
    ));

    let records = server.finish();
    let posts = records.iter().filter(|r| r.method == "POST").count();
    assert_eq!(posts, 10, "at most 10 signed attempts per logical request");
}

/// A signed request with no stored nonce fetches one first.
#[test]
fn test_missing_nonce_is_fetched_before_signing() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("fresh-nonce"),
            ScriptedResponse::new(201)
                .nonce("next-nonce")
                .header("Location", &format!("{base}/account/1"))
                .json(json!({ "status": "valid" })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    assert!(session.nonce().is_none());
    AccountBuilder::new()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .agree_to_terms_of_service()
        .create(&session)
        .unwrap();

    let records = server.finish();
    assert_eq!(records[1].method, "HEAD");
    assert_eq!(records[2].protected()["nonce"], "fresh-nonce");
}

#[test]
fn test_malformed_problem_maps_to_other() {
    let mut mock_server = MockAcmeServer::new();
    let _directory = mock_server.mock_directory();
    let _nonce = mock_server.mock_new_nonce();
    let _new_order = mock_server
        .server
        .mock("POST", "/new-order")
        .with_status(400)
        .with_header("content-type", "application/problem+json")
        .with_body(
            json!({
                "type": "urn:ietf:params:acme:error:malformed",
                "detail": "bad field"
            })
            .to_string(),
        )
        .create();

    let session = Session::new(&mock_server.directory_url()).unwrap();
    let err = order_one_domain(&session).unwrap_err();
    assert!(matches!(
        err,
        AcmeError::Server(ServerError::Other(problem))
            if problem.acme_error() == Some("malformed")
    ));
}
