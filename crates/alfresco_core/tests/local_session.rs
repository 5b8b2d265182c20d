mod common;

use alfresco_core::{
    property_ids, AllowableAction, BaseType, CheckIn, CmisError, ContentStream,
    LocalRepositorySession, OperationContext, Properties, RepositoryClient, RepositoryObject,
    RepositorySession, TypeDefinition, VersioningState,
};
use common::{local_client, text_document, workspace};

fn named(name: &str, type_id: &str) -> Properties {
    let mut properties = Properties::new();
    properties.insert(property_ids::NAME.to_string(), name.into());
    properties.insert(property_ids::OBJECT_TYPE_ID.to_string(), type_id.into());
    properties
}

#[test]
fn on_disk_repository_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repository.db");

    let (repository_id, root_id, document_id) = {
        let client = RepositoryClient::new(LocalRepositorySession::open(&path, "admin").unwrap());
        let folder = workspace(&client, "kept");
        let document = text_document(&client, &folder, "file.txt", "persisted");
        let info = client.session().repository_info().clone();
        (info.id, info.root_folder_id, document.id)
    };

    let client = RepositoryClient::new(LocalRepositorySession::open(&path, "other").unwrap());
    let info = client.session().repository_info();
    assert_eq!(info.id, repository_id);
    assert_eq!(info.root_folder_id, root_id);

    let object = client
        .session()
        .object_by_path("/kept/file.txt", &OperationContext::fresh())
        .unwrap();
    assert_eq!(object.id(), document_id);
    assert_eq!(
        client.get_document_content(&document_id).unwrap().as_deref(),
        Some(b"persisted".as_slice())
    );
}

#[test]
fn root_folder_is_bootstrapped() {
    let client = local_client();
    let root = client.root_folder().unwrap();

    assert_eq!(root.path, "/");
    assert_eq!(root.name, "Company Home");
    assert!(root.parent_id.is_none());
    assert!(!root
        .allowable_actions
        .contains(&AllowableAction::CanDeleteObject));

    let by_path = client
        .session()
        .object_by_path("/", &OperationContext::fresh())
        .unwrap();
    assert_eq!(by_path.id(), root.id);

    let err = client
        .session()
        .object_by_path("relative/path", &OperationContext::fresh())
        .unwrap_err();
    assert!(matches!(err, CmisError::InvalidArgument(_)), "got {err}");
}

#[test]
fn checkout_locks_the_series_until_check_in_or_cancel() {
    let client = local_client();
    let folder = workspace(&client, "locks");
    let document = text_document(&client, &folder, "locked.txt", "v1");
    let session = client.session();
    let ctx = OperationContext::fresh();

    let pwc_id = session.check_out(&document.id).unwrap();
    assert!(pwc_id.ends_with(";pwc"));

    let pwc = client.get_document(&pwc_id, false).unwrap();
    assert!(pwc.is_private_working_copy);
    assert!(pwc.can(AllowableAction::CanCheckIn));
    assert!(pwc.can(AllowableAction::CanCancelCheckOut));

    let latest = client.get_document(&document.id, false).unwrap();
    assert!(latest.is_version_series_checked_out);
    assert!(!latest.can(AllowableAction::CanCheckOut));

    let err = session.check_out(&document.id).unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");
    let err = session.delete_object(&document.id, false).unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");

    session.delete_object(&pwc_id, false).unwrap();
    let released = client.get_document(&document.id, false).unwrap();
    assert!(!released.is_version_series_checked_out);
    assert!(matches!(
        session.object(&pwc_id, &ctx).unwrap_err(),
        CmisError::NotFound(_)
    ));
}

#[test]
fn check_in_without_content_keeps_working_copy_content() {
    let client = local_client();
    let folder = workspace(&client, "keep");
    let document = text_document(&client, &folder, "same.txt", "unchanged");
    let session = client.session();

    let pwc_id = session.check_out(&document.id).unwrap();
    let version_id = session
        .check_in(
            &pwc_id,
            CheckIn {
                major: false,
                properties: Properties::new(),
                content: None,
                comment: Some("metadata only".to_string()),
            },
        )
        .unwrap();

    let version = client.get_document(&version_id, false).unwrap();
    assert_eq!(version.version_label(), Some("1.1"));
    assert_eq!(version.checkin_comment.as_deref(), Some("metadata only"));
    assert_eq!(
        client.get_document_content(&version_id).unwrap().as_deref(),
        Some(b"unchanged".as_slice())
    );
}

#[test]
fn check_in_rename_respects_sibling_names() {
    let client = local_client();
    let folder = workspace(&client, "rename");
    let document = text_document(&client, &folder, "first.txt", "1");
    text_document(&client, &folder, "taken.txt", "2");
    let session = client.session();

    let pwc_id = session.check_out(&document.id).unwrap();
    let mut rename = Properties::new();
    rename.insert(property_ids::NAME.to_string(), "taken.txt".into());
    let err = session
        .check_in(
            &pwc_id,
            CheckIn {
                major: true,
                properties: rename,
                content: None,
                comment: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, CmisError::AlreadyExists(_)), "got {err}");

    let mut rename = Properties::new();
    rename.insert(property_ids::NAME.to_string(), "second.txt".into());
    let version_id = session
        .check_in(
            &pwc_id,
            CheckIn {
                major: true,
                properties: rename,
                content: None,
                comment: None,
            },
        )
        .unwrap();
    assert_eq!(client.get_document(&version_id, false).unwrap().name, "second.txt");
}

#[test]
fn checked_out_creation_yields_only_a_working_copy() {
    let client = local_client();
    let folder = workspace(&client, "drafts");
    let session = client.session();

    let pwc_id = session
        .create_document(
            &folder.id,
            named("draft.txt", "cmis:document"),
            Some(ContentStream::from_bytes(None, "text/plain", b"wip".to_vec())),
            VersioningState::CheckedOut,
        )
        .unwrap();
    let pwc = client.get_document(&pwc_id, false).unwrap();
    assert!(pwc.is_private_working_copy);
    assert_eq!(pwc.content_file_name.as_deref(), Some("draft.txt"));

    let version_id = session
        .check_in(
            &pwc_id,
            CheckIn {
                major: true,
                properties: Properties::new(),
                content: None,
                comment: None,
            },
        )
        .unwrap();
    assert_eq!(
        client.get_document(&version_id, false).unwrap().version_label(),
        Some("1.0")
    );

    let minor_id = session
        .create_document(
            &folder.id,
            named("minor.txt", "cmis:document"),
            None,
            VersioningState::Minor,
        )
        .unwrap();
    let minor = client.get_document(&minor_id, false).unwrap();
    assert_eq!(minor.version_label(), Some("0.1"));
    assert!(!minor.is_major_version);
}

#[test]
fn invalid_names_and_read_only_properties_are_rejected() {
    let client = local_client();
    let folder = workspace(&client, "rules");
    let session = client.session();

    for bad in ["", "a/b"] {
        let err = session
            .create_folder(&folder.id, named(bad, "cmis:folder"))
            .unwrap_err();
        assert!(matches!(err, CmisError::InvalidArgument(_)), "{bad:?}: {err}");
    }

    let mut properties = named("locked.txt", "cmis:document");
    properties.insert(property_ids::VERSION_LABEL.to_string(), "5.0".into());
    let err = session
        .create_document(&folder.id, properties, None, VersioningState::Major)
        .unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");

    let document = text_document(&client, &folder, "typed.txt", "t");
    let mut retype = Properties::new();
    retype.insert(property_ids::OBJECT_TYPE_ID.to_string(), "cmis:document".into());
    let err = session.update_properties(&document.id, retype).unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");
}

#[test]
fn declared_length_must_match_content() {
    let client = local_client();
    let folder = workspace(&client, "lengths");
    let stream = ContentStream::new(
        Some("short.bin".to_string()),
        Some(10),
        "application/octet-stream",
        Box::new(std::io::Cursor::new(vec![1u8, 2, 3])),
    );

    let err = client
        .session()
        .create_document(
            &folder.id,
            named("short.bin", "cmis:document"),
            Some(stream),
            VersioningState::Major,
        )
        .unwrap_err();
    assert!(matches!(err, CmisError::InvalidArgument(_)), "got {err}");
}

#[test]
fn content_stream_requires_a_document_with_content() {
    let client = local_client();
    let folder = workspace(&client, "streams");
    let session = client.session();

    let err = session.content_stream(&folder.id).unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");

    let empty_id = session
        .create_document(
            &folder.id,
            named("no-content", "cmis:document"),
            None,
            VersioningState::Major,
        )
        .unwrap();
    let err = session.content_stream(&empty_id).unwrap_err();
    assert!(matches!(err, CmisError::Constraint(_)), "got {err}");
}

#[test]
fn renaming_a_folder_moves_descendant_paths() {
    let client = local_client();
    let top = workspace(&client, "before");
    let deep = client.create_folder_path(&top, "x/y").unwrap();
    let session = client.session();

    let mut rename = Properties::new();
    rename.insert(property_ids::NAME.to_string(), "after".into());
    session.update_properties(&top.id, rename).unwrap();

    match session.object(&deep.id, &OperationContext::fresh()).unwrap() {
        RepositoryObject::Folder(folder) => assert_eq!(folder.path, "/after/x/y"),
        other => panic!("expected folder, got {other:?}"),
    }
    let moved = client.create_folder_path(&client.root_folder().unwrap(), "after/x/y").unwrap();
    assert_eq!(moved.id, deep.id);
}

#[test]
fn type_registry_resolves_and_guards_definitions() {
    let session = LocalRepositorySession::open_in_memory("admin").unwrap();

    let folder_type = session.type_definition("cmis:folder").unwrap();
    assert_eq!(
        folder_type.property_query_name(property_ids::OBJECT_ID),
        Some("cmis:objectId")
    );
    let custom = session.type_definition("cmiscustom:document").unwrap();
    assert_eq!(custom.id, "D:cmiscustom:document");
    assert_eq!(custom.base_type, BaseType::Document);
    assert!(custom.versionable);

    let err = session.type_definition("acme:missing").unwrap_err();
    assert!(matches!(err, CmisError::NotFound(_)), "got {err}");

    let duplicate = TypeDefinition::new("cmis:folder", BaseType::Folder, Some("cmis:folder"));
    let err = session.define_type(&duplicate).unwrap_err();
    assert!(matches!(err, CmisError::AlreadyExists(_)), "got {err}");

    let mismatched = TypeDefinition::new("F:acme:box", BaseType::Folder, Some("cmis:document"));
    let err = session.define_type(&mismatched).unwrap_err();
    assert!(matches!(err, CmisError::InvalidArgument(_)), "got {err}");
}
