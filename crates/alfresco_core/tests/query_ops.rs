mod common;

use alfresco_core::{
    property_ids, BaseType, CmisError, LocalRepositorySession, OperationContext, Properties,
    PropertyValue, RepositoryClient, RepositoryObject, RepositorySession, TypeDefinition,
};
use common::{local_client, text_document, workspace};

fn names(objects: &[RepositoryObject]) -> Vec<String> {
    let mut names = objects
        .iter()
        .filter_map(|object| object.name().map(ToString::to_string))
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn find_documents_in_folder_is_scoped_to_that_folder() {
    let client = local_client();
    let inbox = workspace(&client, "inbox");
    let archive = workspace(&client, "archive");
    text_document(&client, &inbox, "one.txt", "1");
    text_document(&client, &inbox, "two.txt", "2");
    text_document(&client, &archive, "old.txt", "0");
    client.create_folder(&inbox, "nested").unwrap();

    let found = client.find_documents_in_folder(&inbox, 0, false).unwrap();
    assert_eq!(names(&found), vec!["one.txt", "two.txt"]);
    assert!(found
        .iter()
        .all(|object| object.base_type() == BaseType::Document));
}

#[test]
fn find_documents_by_text_matches_body_and_latest_versions_only() {
    let client = local_client();
    let folder = workspace(&client, "search");
    let memo = text_document(&client, &folder, "memo.txt", "budget draft for review");
    text_document(&client, &folder, "lunch.txt", "sandwich order");

    let found = client.find_documents_by_text("budget", 0, false).unwrap();
    assert_eq!(names(&found), vec!["memo.txt"]);

    client
        .update_document(&memo, b"final numbers", "text/plain", None, true, None)
        .unwrap();
    assert!(client
        .find_documents_by_text("budget", 0, false)
        .unwrap()
        .is_empty());
    let found = client.find_documents_by_text("numbers", 0, true).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].as_document().and_then(|document| document.version_label()),
        Some("2.0")
    );
}

#[test]
fn max_items_limits_page_and_zero_uses_default() {
    let client = local_client();
    let folder = workspace(&client, "paging");
    for index in 0..5 {
        text_document(&client, &folder, &format!("doc-{index}.txt"), "x");
    }

    assert_eq!(client.find_documents_in_folder(&folder, 2, false).unwrap().len(), 2);
    assert_eq!(client.find_documents_in_folder(&folder, 0, false).unwrap().len(), 5);
}

#[test]
fn execute_query_supports_like_order_and_comparisons() {
    let client = local_client();
    let folder = workspace(&client, "reports");
    for (name, priority) in [("report-b", 1), ("report-a", 5), ("summary", 9)] {
        let mut properties = Properties::new();
        properties.insert("acme:priority".to_string(), PropertyValue::Integer(priority));
        client
            .create_document(&folder, name, b"r", "text/plain", None, Some(properties))
            .unwrap();
    }

    let ordered = client
        .execute_query(
            "SELECT * FROM cmis:document WHERE cmis:name LIKE 'report%' ORDER BY cmis:name DESC",
            0,
            false,
        )
        .unwrap();
    let in_order = ordered
        .iter()
        .filter_map(|object| object.name())
        .collect::<Vec<_>>();
    assert_eq!(in_order, vec!["report-b", "report-a"]);

    let urgent = client
        .execute_query(
            "SELECT cmis:objectId FROM cmis:document WHERE acme:priority >= 5 AND cmis:name <> 'summary'",
            0,
            false,
        )
        .unwrap();
    assert_eq!(names(&urgent), vec!["report-a"]);
}

#[test]
fn in_tree_reaches_nested_folders_and_accepts_node_refs() {
    let client = local_client();
    let top = workspace(&client, "top");
    let deep = client.create_folder_path(&top, "a/b").unwrap();
    text_document(&client, &top, "shallow.txt", "s");
    text_document(&client, &deep, "deep.txt", "d");

    let ctx = OperationContext::fresh();
    let rows = client
        .session()
        .query(
            &format!(
                "SELECT cmis:name FROM cmis:document WHERE IN_TREE('workspace://SpacesStore/{}')",
                top.id
            ),
            false,
            None,
            &ctx,
        )
        .unwrap();
    let mut found = rows
        .iter()
        .filter_map(|row| row.property_by_query_name("cmis:name"))
        .filter_map(|property| property.first_value().and_then(PropertyValue::as_str))
        .collect::<Vec<_>>();
    found.sort();
    assert_eq!(found, vec!["deep.txt", "shallow.txt"]);
}

#[test]
fn join_on_secondary_type_filters_and_resolves_qualified_ids() {
    let session = LocalRepositorySession::open_in_memory("admin").unwrap();
    let mut classified = TypeDefinition::new(
        "P:acme:classified",
        BaseType::Secondary,
        Some("cmis:secondary"),
    );
    classified.query_name = "acme:classified".to_string();
    classified.property_definitions = vec![("acme:level".to_string(), "acme:level".to_string())];
    session.define_type(&classified).unwrap();
    let client = RepositoryClient::new(session);
    let folder = workspace(&client, "vault");

    let mut secret = Properties::new();
    secret.insert(
        property_ids::SECONDARY_OBJECT_TYPE_IDS.to_string(),
        PropertyValue::from(vec!["acme:classified"]),
    );
    secret.insert("acme:level".to_string(), "secret".into());
    let tagged = client
        .create_document(&folder, "plans.txt", b"p", "text/plain", None, Some(secret))
        .unwrap();
    assert_eq!(tagged.secondary_type_ids, vec!["P:acme:classified"]);
    text_document(&client, &folder, "public.txt", "open");

    let statement = "SELECT d.*, t.* FROM cmis:document AS d \
                     JOIN acme:classified AS t ON d.cmis:objectId = t.cmis:objectId \
                     WHERE t.acme:level = 'secret'";
    let rows = client
        .session()
        .query(statement, false, None, &OperationContext::default())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].property_by_query_name("d.cmis:objectId").is_some());
    assert_eq!(
        rows[0]
            .property_by_query_name("t.acme:level")
            .and_then(|property| property.first_value())
            .and_then(PropertyValue::as_str),
        Some("secret")
    );

    let found = client.execute_query(statement, 0, false).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), tagged.id);
}

#[test]
fn malformed_or_unknown_queries_are_invalid_argument() {
    let client = local_client();

    for statement in [
        "SELEC * FROM cmis:document",
        "SELECT * FROM acme:nothing",
        "SELECT * FROM cmis:document WHERE cmis:name = 'a' OR cmis:name = 'b'",
        "SELECT * FROM cmis:secondary",
    ] {
        let err = client.execute_query(statement, 0, false).unwrap_err();
        assert!(
            matches!(err, CmisError::InvalidArgument(_)),
            "{statement}: {err}"
        );
    }
}
