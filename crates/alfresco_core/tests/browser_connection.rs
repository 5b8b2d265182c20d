mod common;

use alfresco_core::{create_session, BindingType, CmisError, RepositoryClient, SessionConfig};
use common::loopback::{Loopback, Reply};

const BROWSER_PATH: &str = "/alfresco/api/-default-/public/cmis/versions/1.1/browser";

#[test]
fn unreachable_endpoint_is_connection_error() {
    let err = create_session("admin", "admin", "http://127.0.0.1:1/alfresco").unwrap_err();
    assert!(matches!(err, CmisError::Connection(_)), "got {err}");
    assert_eq!(err.code(), "CONNECTION_ERROR");
}

#[test]
fn rejected_credentials_are_connection_error() {
    let server = Loopback::start(|_| vec![Reply::status("HTTP/1.1 401 Unauthorized", "{}")]);

    let err = create_session("admin", "wrong", &server.url(BROWSER_PATH)).unwrap_err();
    match err {
        CmisError::Connection(message) => assert!(message.contains("401"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(server.request(0).starts_with(&format!("GET {BROWSER_PATH} ")));
}

#[test]
fn endpoint_without_repositories_is_connection_error() {
    let server = Loopback::start(|_| vec![Reply::ok("{}")]);

    let err = create_session("admin", "admin", &server.url(BROWSER_PATH)).unwrap_err();
    assert!(matches!(err, CmisError::Connection(_)), "got {err}");
}

#[test]
fn only_the_browser_binding_is_available() {
    for binding in [BindingType::AtomPub, BindingType::WebServices] {
        let config = SessionConfig::new("admin", "admin", "http://127.0.0.1:1/alfresco")
            .with_binding(binding);
        let err = RepositoryClient::connect(&config).unwrap_err();
        assert!(matches!(err, CmisError::NotSupported(_)), "got {err}");
    }
}
