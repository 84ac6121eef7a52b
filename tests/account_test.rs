mod common;

use acmekit::prelude::*;
use common::{MockAcmeServer, ScriptedResponse, ScriptedServer, directory_response};
use serde_json::json;
use url::Url;

/// Scenario: register an account and read it back. The first request
/// must identify itself with an embedded `jwk`, not a `kid`.
#[test]
fn test_register_account_with_jwk_header() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(201)
                .nonce("nonce-2")
                .header("Location", &format!("{base}/account/1"))
                .json(json!({
                    "status": "valid",
                    "contact": ["mailto:a@e.com"]
                })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let mut account = AccountBuilder::new()
        .add_contact("mailto:a@e.com")
        .unwrap()
        .agree_to_terms_of_service()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .create(&session)
        .unwrap();

    assert_eq!(account.location().as_str(), server.url("/account/1"));
    assert_eq!(account.status().unwrap(), Status::Valid);
    assert_eq!(
        account.contacts().unwrap(),
        [Url::parse("mailto:a@e.com").unwrap()]
    );
    // the response nonce replaced the consumed one
    assert_eq!(session.nonce().as_deref(), Some("nonce-2"));

    let records = server.finish();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].method, "GET");
    assert_eq!(records[0].path, "/directory");
    assert_eq!(records[1].method, "HEAD");
    assert_eq!(records[1].path, "/new-nonce");
    assert_eq!(records[2].method, "POST");
    assert_eq!(records[2].path, "/new-account");
    assert_eq!(
        records[2].header("content-type"),
        Some("application/jose+json")
    );

    let protected = records[2].protected();
    assert!(protected.get("jwk").is_some(), "registration must embed the jwk");
    assert!(protected.get("kid").is_none(), "registration must not use a kid");
    assert_eq!(protected["nonce"], "nonce-1");
    assert_eq!(protected["alg"], "ES256");

    let payload = records[2].payload().unwrap();
    assert_eq!(payload["termsOfServiceAgreed"], true);
    assert_eq!(payload["contact"], json!(["mailto:a@e.com"]));
}

/// Scenario: a badNonce problem is replayed transparently with the
/// nonce that came along with the error response.
#[test]
fn test_bad_nonce_is_replayed() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(400).nonce("nonce-2").problem(json!({
                "type": "urn:ietf:params:acme:error:badNonce",
                "detail": "nonce is stale"
            })),
            ScriptedResponse::new(201)
                .nonce("nonce-3")
                .header("Location", &format!("{base}/account/1"))
                .json(json!({ "status": "valid" })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let account = AccountBuilder::new()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .agree_to_terms_of_service()
        .create(&session)
        .unwrap();
    assert_eq!(account.location().as_str(), server.url("/account/1"));

    let records = server.finish();
    let posts: Vec<_> = records.iter().filter(|r| r.method == "POST").collect();
    assert_eq!(posts.len(), 2, "exactly two POSTs to the target URL");
    assert_eq!(posts[0].path, "/new-account");
    assert_eq!(posts[1].path, "/new-account");
    assert_eq!(posts[0].protected()["nonce"], "nonce-1");
    assert_eq!(posts[1].protected()["nonce"], "nonce-2");
}

#[test]
fn test_only_existing_rejects_unknown_account() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(400).nonce("nonce-2").problem(json!({
                "type": "urn:ietf:params:acme:error:accountDoesNotExist",
                "detail": "no account found for this key"
            })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let err = AccountBuilder::new()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .only_existing()
        .create(&session)
        .unwrap_err();
    assert!(matches!(
        err,
        AcmeError::Server(ServerError::AccountDoesNotExist(_))
    ));

    let records = server.finish();
    let payload = records[2].payload().unwrap();
    assert_eq!(payload["onlyReturnExisting"], true);
}

#[test]
fn test_key_rollover_signs_inner_jws_with_new_key() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(200).nonce("nonce-2").json(json!({})),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let old_key = KeyPair::generate_p256().unwrap();
    let old_thumbprint = old_key.thumbprint().unwrap();
    let new_key = KeyPair::generate_p384().unwrap();
    let new_thumbprint = new_key.thumbprint().unwrap();
    let account_url = Url::parse(&server.url("/account/1")).unwrap();

    let login = session.login(account_url.clone(), old_key);
    let mut account = login.account();
    account.change_key(new_key).unwrap();

    // the login now signs with the new key, and its thumbprint is
    // reproducible after the rollover
    assert_eq!(login.key_pair().thumbprint().unwrap(), new_thumbprint);
    assert_ne!(new_thumbprint, old_thumbprint);

    let records = server.finish();
    let outer = &records[2];
    assert_eq!(outer.path, "/key-change");
    let outer_protected = outer.protected();
    assert_eq!(outer_protected["kid"], account_url.as_str());
    assert_eq!(outer_protected["alg"], "ES256");

    // payload is the inner JWS signed by the new key
    let inner = outer.payload().unwrap();
    let inner_protected: serde_json::Value = serde_json::from_slice(
        &acmekit::crypto::base64url_decode(inner["protected"].as_str().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(inner_protected["alg"], "ES384");
    assert!(inner_protected.get("jwk").is_some());
    assert!(inner_protected.get("nonce").is_none());

    let inner_payload: serde_json::Value = serde_json::from_slice(
        &acmekit::crypto::base64url_decode(inner["payload"].as_str().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(inner_payload["account"], account_url.as_str());
    assert!(inner_payload.get("oldKey").is_some());
}

#[test]
fn test_deactivate_account() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(200)
                .nonce("nonce-2")
                .json(json!({ "status": "deactivated" })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let login = session.login(
        Url::parse(&server.url("/account/1")).unwrap(),
        KeyPair::generate_p256().unwrap(),
    );
    let mut account = login.account();
    account.deactivate().unwrap();
    assert_eq!(account.status().unwrap(), Status::Deactivated);

    let account_url = server.url("/account/1");
    let records = server.finish();
    assert_eq!(records[2].path, "/account/1");
    assert_eq!(records[2].payload().unwrap()["status"], "deactivated");
    assert_eq!(records[2].protected()["kid"], account_url);
}

#[test]
fn test_update_contacts() {
    let server = ScriptedServer::start(|base| {
        vec![
            directory_response(base),
            ScriptedResponse::new(200).nonce("nonce-1"),
            ScriptedResponse::new(200).nonce("nonce-2").json(json!({
                "status": "valid",
                "contact": ["mailto:new@example.com"]
            })),
        ]
    });

    let session = Session::new(&server.url("/directory")).unwrap();
    let login = session.login(
        Url::parse(&server.url("/account/1")).unwrap(),
        KeyPair::generate_p256().unwrap(),
    );
    let mut account = login.account();
    account
        .modify()
        .add_email("new@example.com")
        .unwrap()
        .commit()
        .unwrap();
    assert_eq!(
        account.contacts().unwrap(),
        [Url::parse("mailto:new@example.com").unwrap()]
    );

    let records = server.finish();
    assert_eq!(
        records[2].payload().unwrap()["contact"],
        json!(["mailto:new@example.com"])
    );
}

/// The mockito-backed harness covers the plain registration flow too
#[test]
fn test_register_against_mock_server() {
    let mut mock_server = MockAcmeServer::new();
    let directory = mock_server.mock_directory();
    let nonce = mock_server.mock_new_nonce();
    let new_account = mock_server.mock_new_account();

    let session = Session::new(&mock_server.directory_url()).unwrap();
    let login = AccountBuilder::new()
        .add_email("admin@example.com")
        .unwrap()
        .agree_to_terms_of_service()
        .use_key_pair(KeyPair::generate_p256().unwrap())
        .create_login(&session)
        .unwrap();

    assert_eq!(
        login.account_location().as_str(),
        format!("{}/account/1", mock_server.url())
    );
    directory.assert();
    nonce.assert();
    new_account.assert();
}
