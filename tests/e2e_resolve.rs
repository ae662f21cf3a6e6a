//! End-to-end resolution against a mock registry server

mod helper;

use mockito::{Matcher, Server};
use serde_json::json;

use helper::{packument_body, packument_value};
use packument_resolver::config::{CORGI_DOC, FULL_DOC, PickOptions, RegistryConfig};
use packument_resolver::resolver::Resolver;
use packument_resolver::version::cutoff::parse_instant;
use packument_resolver::version::error::{RegistryError, ResolveError};

fn resolver(server: &Server) -> Resolver {
    let config = RegistryConfig {
        url: server.url(),
        ..Default::default()
    };
    Resolver::from_config(&config).unwrap()
}

#[tokio::test]
async fn resolves_caret_range_to_highest_matching_release() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/lodash")
        .match_header("accept", CORGI_DOC)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(packument_body(
            "lodash",
            &["3.10.1", "4.17.20", "4.17.21", "5.0.0-beta.1"],
            "4.17.20",
        ))
        .create_async()
        .await;

    let manifest = resolver(&server)
        .resolve("lodash", "^4.17.21", &PickOptions::default())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(manifest.version, "4.17.21");
}

#[tokio::test]
async fn resolves_dist_tag() {
    let mut server = Server::new_async().await;
    let mut body = packument_value("react", &["18.2.0", "19.0.0-rc.1"], "18.2.0");
    body["dist-tags"]["next"] = json!("19.0.0-rc.1");
    let mock = server
        .mock("GET", "/react")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let resolver = resolver(&server);
    let next = resolver
        .resolve("react", "next", &PickOptions::default())
        .await
        .unwrap();
    let latest = resolver
        .resolve("react", "", &PickOptions::default())
        .await
        .unwrap();

    // second resolve is served from the store
    mock.assert_async().await;
    assert_eq!(next.version, "19.0.0-rc.1");
    assert_eq!(latest.version, "18.2.0");
}

#[tokio::test]
async fn scoped_package_names_are_encoded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/@types%2Fnode")
        .with_status(200)
        .with_body(packument_body("@types/node", &["20.11.0"], "20.11.0"))
        .create_async()
        .await;

    let manifest = resolver(&server)
        .resolve("@types/node", "20.11.0", &PickOptions::default())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(manifest.name, "@types/node");
}

#[tokio::test]
async fn missing_abbreviated_document_falls_back_to_full_metadata() {
    let mut server = Server::new_async().await;
    let corgi = server
        .mock("GET", "/private-pkg")
        .match_header("accept", CORGI_DOC)
        .with_status(404)
        .create_async()
        .await;
    let full = server
        .mock("GET", "/private-pkg")
        .match_header("accept", Matcher::Exact(FULL_DOC.to_string()))
        .with_status(200)
        .with_body(packument_body("private-pkg", &["1.0.0"], "1.0.0"))
        .create_async()
        .await;

    let manifest = resolver(&server)
        .resolve("private-pkg", "latest", &PickOptions::default())
        .await
        .unwrap();

    corgi.assert_async().await;
    full.assert_async().await;
    assert_eq!(manifest.version, "1.0.0");
}

#[tokio::test]
async fn unknown_package_is_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/does-not-exist")
        .with_status(404)
        .expect(2)
        .create_async()
        .await;

    let err = resolver(&server)
        .resolve("does-not-exist", "latest", &PickOptions::default())
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(
        err,
        ResolveError::Registry(RegistryError::NotFound(ref name)) if name == "does-not-exist"
    ));
}

#[tokio::test]
async fn local_cache_headers_annotate_the_packument() {
    let mut server = Server::new_async().await;
    let body = packument_body("left-pad", &["1.3.0"], "1.3.0");
    let _mock = server
        .mock("GET", "/left-pad")
        .with_status(200)
        .with_header("x-local-cache", "/home/user/.npm/_cacache")
        .with_body(&body)
        .create_async()
        .await;

    let packument = resolver(&server).packument("left-pad").await.unwrap();

    assert!(packument.cached);
    assert_eq!(packument.content_length, body.len() as u64);
}

#[tokio::test]
async fn fetched_packument_keeps_uninterpreted_fields() {
    let mut server = Server::new_async().await;
    let mut body = packument_value("left-pad", &["1.3.0"], "1.3.0");
    body["_id"] = json!("left-pad");
    body["description"] = json!("String left pad");
    body["maintainers"] = json!([{ "name": "stevemao" }]);
    let _mock = server
        .mock("GET", "/left-pad")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let packument = resolver(&server).packument("left-pad").await.unwrap();
    let printed = serde_json::to_value(packument.as_ref()).unwrap();

    assert_eq!(printed["_id"], "left-pad");
    assert_eq!(printed["description"], "String left pad");
    assert_eq!(printed["maintainers"][0]["name"], "stevemao");
    assert_eq!(printed["dist-tags"]["latest"], "1.3.0");
}

#[tokio::test]
async fn restricted_selection_is_a_policy_violation() {
    let mut server = Server::new_async().await;
    let mut body = packument_value("event-stream", &["3.3.4"], "3.3.4");
    body["policyRestrictions"] = json!({
        "message": "3.3.6 is blocked by your organization",
        "versions": {
            "3.3.6": { "name": "event-stream", "version": "3.3.6" }
        }
    });
    let _mock = server
        .mock("GET", "/event-stream")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let resolver = resolver(&server);
    let err = resolver
        .resolve("event-stream", "3.3.6", &PickOptions::default())
        .await
        .unwrap_err();
    let allowed = resolver
        .resolve("event-stream", "^3.3.0", &PickOptions::default())
        .await
        .unwrap();

    assert_eq!(
        err.to_string(),
        "Could not download \"event-stream@3.3.6\" due to policy violations:\n\"3.3.6 is blocked by your organization\""
    );
    assert_eq!(allowed.version, "3.3.4");
}

#[tokio::test]
async fn before_cutoff_limits_selection() {
    let mut server = Server::new_async().await;
    let mut body = packument_value("chalk", &["4.1.2", "5.0.0", "5.3.0"], "5.3.0");
    body["time"] = json!({
        "created": "2013-08-03T00:00:00.000Z",
        "4.1.2": "2021-07-30T00:00:00.000Z",
        "5.0.0": "2021-11-26T00:00:00.000Z",
        "5.3.0": "2023-06-29T00:00:00.000Z",
    });
    let _mock = server
        .mock("GET", "/chalk")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let resolver = resolver(&server);
    let opts = PickOptions {
        before: parse_instant("2022-01-01"),
        ..Default::default()
    };

    let latest = resolver.resolve("chalk", "latest", &opts).await.unwrap();
    let ranged = resolver.resolve("chalk", "^4", &opts).await.unwrap();
    let err = resolver.resolve("chalk", "^5.1.0", &opts).await.unwrap_err();

    assert_eq!(latest.version, "5.0.0");
    assert_eq!(ranged.version, "4.1.2");
    assert_eq!(
        err.to_string(),
        "No matching version found for \"chalk@^5.1.0 with a date before 2022-01-01 00:00:00 UTC\"."
    );
}
