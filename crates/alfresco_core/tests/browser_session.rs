mod common;

use alfresco_core::{
    property_ids, BrowserBindingSession, CheckIn, CmisError, ContentStream, IncludeRelationships,
    OperationContext, Properties, RepositoryClient, RepositorySession, SessionConfig,
    VersioningState,
};
use common::loopback::{service_document, Loopback, Reply};
use serde_json::{json, Value};

fn connect(server: &Loopback) -> BrowserBindingSession {
    let config = SessionConfig::new("admin", "secret", &server.url("/browser"));
    BrowserBindingSession::connect(&config).unwrap()
}

fn typed(kind: &str, value: Value) -> Value {
    json!({"type": kind, "value": value})
}

fn version_json(id: &str, series: &str, label: &str, latest: bool) -> String {
    json!({
        "properties": {
            "cmis:objectId": typed("id", json!(id)),
            "cmis:baseTypeId": typed("id", json!("cmis:document")),
            "cmis:objectTypeId": typed("id", json!("cmis:document")),
            "cmis:name": typed("string", json!("plan.txt")),
            "cmis:versionSeriesId": typed("id", json!(series)),
            "cmis:versionLabel": typed("string", json!(label)),
            "cmis:isLatestVersion": typed("boolean", json!(latest))
        },
        "allowableActions": {"canCheckOut": latest}
    })
    .to_string()
}

fn folder_json(id: &str, path: &str) -> String {
    json!({
        "properties": {
            "cmis:objectId": typed("id", json!(id)),
            "cmis:baseTypeId": typed("id", json!("cmis:folder")),
            "cmis:name": typed("string", json!(path.rsplit('/').next().unwrap_or_default())),
            "cmis:path": typed("string", json!(path))
        }
    })
    .to_string()
}

fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or_default()
}

#[test]
fn cached_fetch_skips_the_server_unless_bypassed() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
        ]
    });
    let session = connect(&server);
    let cached = OperationContext::with_cache(true);

    let first = session.object("v1", &cached).unwrap();
    assert_eq!(first.id(), "v1");
    let fetch = server.request(1);
    assert!(request_line(&fetch).starts_with("GET /r/root?"), "{fetch}");
    assert!(fetch.contains("cmisselector=object"), "{fetch}");
    assert!(fetch.contains("objectId=v1"), "{fetch}");
    assert!(
        fetch.to_ascii_lowercase().contains("authorization: basic "),
        "{fetch}"
    );

    session.object("v1", &cached).unwrap();
    assert_eq!(server.requests().len(), 2);

    session.object("v1", &OperationContext::fresh()).unwrap();
    assert_eq!(server.requests().len(), 3);

    let with_relationships = cached.include_relationships(IncludeRelationships::Source);
    session.object("v1", &with_relationships).unwrap();
    assert_eq!(server.requests().len(), 4);
    assert!(server.request(3).contains("includeRelationships=source"));
}

#[test]
fn path_lookup_percent_encodes_each_segment() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(folder_json("f1", "/base/x#1 50%?")),
        ]
    });
    let session = connect(&server);

    let folder = session
        .object_by_path("/base/x#1 50%?", &OperationContext::fresh())
        .unwrap();
    assert_eq!(folder.id(), "f1");

    let lookup = server.request(1);
    assert!(
        request_line(&lookup).starts_with("GET /r/root/base/x%231%2050%25%3F?cmisselector=object"),
        "{lookup}"
    );
}

#[test]
fn create_folder_path_finds_existing_folder_with_reserved_characters() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(folder_json("sites", "/Sites")),
            Reply::ok(folder_json("f2", "/Sites/R&D #2")),
        ]
    });
    let client = RepositoryClient::new(connect(&server));
    let sites = client
        .session()
        .object("sites", &OperationContext::fresh())
        .unwrap()
        .into_folder()
        .unwrap();

    let folder = client.create_folder_path(&sites, "R&D #2").unwrap();
    assert_eq!(folder.id, "f2");
    assert_eq!(server.requests().len(), 3);
    let lookup = server.request(2);
    assert!(
        request_line(&lookup).starts_with("GET /r/root/Sites/R&D%20%232?"),
        "{lookup}"
    );
}

#[test]
fn update_posts_action_form_and_evicts_cached_object() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
        ]
    });
    let session = connect(&server);
    let cached = OperationContext::with_cache(true);
    session.object("v1", &cached).unwrap();

    let mut properties = Properties::new();
    properties.insert(property_ids::NAME.to_string(), "renamed.txt".into());
    let id = session.update_properties("v1", properties).unwrap();
    assert_eq!(id, "v1");

    let update = server.request(2);
    assert!(request_line(&update).starts_with("POST /r/root "), "{update}");
    assert!(
        update
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"),
        "{update}"
    );
    for field in [
        "cmisaction=update",
        "succinct=false",
        "objectId=v1",
        "propertyId%5B0%5D=cmis%3Aname",
        "propertyValue%5B0%5D=renamed.txt",
    ] {
        assert!(update.contains(field), "missing {field}: {update}");
    }

    session.object("v1", &cached).unwrap();
    assert_eq!(server.requests().len(), 4);
}

#[test]
fn create_document_sends_content_as_multipart() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::status(
                "HTTP/1.1 201 Created",
                version_json("d1", "s9", "1.0", true),
            ),
        ]
    });
    let session = connect(&server);

    let mut properties = Properties::new();
    properties.insert(property_ids::NAME.to_string(), "note.txt".into());
    properties.insert(property_ids::OBJECT_TYPE_ID.to_string(), "cmis:document".into());
    let id = session
        .create_document(
            "folder-1",
            properties,
            Some(ContentStream::from_bytes(
                Some("note.txt".to_string()),
                "text/plain",
                b"hello body".to_vec(),
            )),
            VersioningState::Major,
        )
        .unwrap();
    assert_eq!(id, "d1");

    let create = server.request(1);
    let lower = create.to_ascii_lowercase();
    assert!(lower.contains("content-type: multipart/form-data; boundary="), "{create}");
    assert!(create.contains("name=\"cmisaction\"\r\n\r\ncreateDocument"), "{create}");
    assert!(create.contains("name=\"objectId\"\r\n\r\nfolder-1"), "{create}");
    assert!(create.contains("name=\"versioningState\"\r\n\r\nmajor"), "{create}");
    assert!(create.contains("name=\"content\"; filename=\"note.txt\""), "{create}");
    assert!(lower.contains("content-type: text/plain"), "{create}");
    assert!(create.contains("hello body"), "{create}");
}

#[test]
fn check_in_uploads_content_and_evicts_previous_latest_version() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(version_json("v1", "s1", "1.0", true)),
            Reply::ok(version_json("v2", "s1", "2.0", true)),
            Reply::ok(version_json("v1", "s1", "1.0", false)),
        ]
    });
    let session = connect(&server);
    let cached = OperationContext::with_cache(true);
    let before = session.object("v1", &cached).unwrap();
    assert!(before.as_document().unwrap().is_latest_version);

    let new_id = session
        .check_in(
            "pwc",
            CheckIn {
                major: true,
                properties: Properties::new(),
                content: Some(ContentStream::from_bytes(
                    None,
                    "text/plain",
                    b"second draft".to_vec(),
                )),
                comment: Some("second".to_string()),
            },
        )
        .unwrap();
    assert_eq!(new_id, "v2");

    let check_in = server.request(2);
    for part in [
        "name=\"cmisaction\"\r\n\r\ncheckIn",
        "name=\"objectId\"\r\n\r\npwc",
        "name=\"major\"\r\n\r\ntrue",
        "name=\"checkinComment\"\r\n\r\nsecond",
        "second draft",
    ] {
        assert!(check_in.contains(part), "missing {part:?}: {check_in}");
    }

    let after = session.object("v1", &cached).unwrap();
    assert_eq!(server.requests().len(), 4);
    assert!(!after.as_document().unwrap().is_latest_version);
}

#[test]
fn deleting_all_versions_evicts_every_cached_version() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::ok(version_json("v1", "s1", "1.0", false)),
            Reply::ok(version_json("v2", "s1", "2.0", true)),
            Reply::ok(""),
            Reply::status(
                "HTTP/1.1 404 Not Found",
                r#"{"exception":"objectNotFound","message":"v1 is gone"}"#,
            ),
        ]
    });
    let session = connect(&server);
    let cached = OperationContext::with_cache(true);
    session.object("v1", &cached).unwrap();
    session.object("v2", &cached).unwrap();

    session.delete_object("v2", true).unwrap();
    let delete = server.request(3);
    assert!(delete.contains("cmisaction=delete"), "{delete}");
    assert!(delete.contains("allVersions=true"), "{delete}");

    match session.object("v1", &cached).unwrap_err() {
        CmisError::NotFound(message) => assert_eq!(message, "v1 is gone"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.requests().len(), 5);
}

#[test]
fn repository_exceptions_map_to_error_kinds() {
    let server = Loopback::start(|base| {
        vec![
            Reply::ok(service_document(base)),
            Reply::status(
                "HTTP/1.1 409 Conflict",
                r#"{"exception":"nameConstraintViolation","message":"dup"}"#,
            ),
            Reply::status("HTTP/1.1 500 Internal Server Error", "<html>boom</html>"),
        ]
    });
    let session = connect(&server);

    let mut properties = Properties::new();
    properties.insert(property_ids::NAME.to_string(), "taken".into());
    properties.insert(property_ids::OBJECT_TYPE_ID.to_string(), "cmis:folder".into());
    match session.create_folder("root-id", properties).unwrap_err() {
        CmisError::AlreadyExists(message) => assert_eq!(message, "dup"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(server.request(1).contains("cmisaction=createFolder"));

    let err = session.check_out("v1").unwrap_err();
    assert!(matches!(err, CmisError::Runtime(_)), "got {err}");
    assert_eq!(err.code(), "RUNTIME");
}
