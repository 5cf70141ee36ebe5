use gel_auth::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

const USER_ID: &str = "7a1b3c4d-0000-4000-8000-000000000001";

fn auth_schema() -> Schema {
    serde_json::from_value(json!({
        "user": {
            "modelName": "user",
            "fields": {
                "email": { "type": "string", "required": true, "unique": true },
                "name": { "type": "string" },
                "emailVerified": { "type": "boolean", "fieldName": "email_verified" },
                "role": { "type": ["admin", "member"] },
                "createdAt": { "type": "date" }
            }
        },
        "session": {
            "modelName": "session",
            "fields": {
                "token": { "type": "string", "required": true, "unique": true },
                "userId": {
                    "type": "string",
                    "required": true,
                    "references": { "model": "user", "field": "id", "onDelete": "cascade" }
                },
                "role": { "type": ["admin", "member"] },
                "expiresAt": { "type": "date" }
            }
        }
    }))
    .expect("schema fixture")
}

fn record(value: serde_json::Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn adapter(config: AdapterConfig) -> GelAdapter<DryRunClient> {
    GelAdapter::new(DryRunClient::new(), config)
}

#[tokio::test]
async fn test_create_user_with_projection() {
    let schema = auth_schema();
    let client = DryRunClient::with_rows(vec![json!({ "id": USER_ID, "email": "a@b.com" })]);
    let adapter = GelAdapter::new(&client, AdapterConfig::new("auth"));
    let select = ["email".to_string(), "name".to_string()];

    let created = adapter
        .create(
            &schema,
            "user",
            &record(json!({ "email": "a@b.com", "name": "A" })),
            Some(&select),
        )
        .await
        .expect("create");
    assert_eq!(created["id"], json!(USER_ID));

    let stmt = client.last().expect("statement");
    assert_eq!(
        stmt.text,
        "with module auth select (insert user { email := <str>$params_email, name := <str>$params_name }) { id, email, name }"
    );
    assert_eq!(stmt.params.len(), 2);
}

#[test]
fn test_find_many_clause_order() {
    let schema = auth_schema();
    let options: FindMany = serde_json::from_value(json!({
        "limit": 10,
        "offset": 5,
        "sortBy": { "field": "createdAt", "direction": "desc" }
    }))
    .expect("options");

    let stmt = adapter(AdapterConfig::new("auth"))
        .find_many_statement(&schema, "user", &[Where::eq("role", "admin")], &options)
        .expect("statement");

    let text = &stmt.text;
    let filter = text.find(" filter ").expect("filter");
    let order = text.find(" order by .createdAt desc").expect("order");
    let offset = text.find(" offset 5").expect("offset");
    let limit = text.find(" limit 10").expect("limit");
    assert!(filter < order && order < offset && offset < limit);
    assert!(text.contains(".role = <Role>$filter_role"));
}

#[test]
fn test_connectors_and_repeated_fields() {
    let schema = auth_schema();
    let conditions =
        gel_auth::parse_filter("name~ada | name^=Ad & emailVerified=true").expect("filter");

    let stmt = adapter(AdapterConfig::new("auth"))
        .count_statement(&schema, "user", &conditions)
        .expect("statement");

    assert_eq!(
        stmt.text,
        "with module auth select count((select user filter .name like <str>$filter_name or .name like <str>$filter_name_1 and .emailVerified = <bool>$filter_email_verified))"
    );
    assert_eq!(stmt.params["filter_name"], json!("%ada%"));
    assert_eq!(stmt.params["filter_name_1"], json!("Ad%"));
    assert_eq!(stmt.params["filter_email_verified"], json!(true));
}

#[test]
fn test_reference_filter_and_assignment() {
    let schema = auth_schema();
    let adapter = adapter(AdapterConfig::new("auth").use_plural(true));

    let stmt = adapter
        .find_one_statement(&schema, "session", &[Where::eq("userId", USER_ID)], None)
        .expect("find");
    assert!(stmt.text.contains("filter .user.id = <uuid>$filter_userId"));
    assert_eq!(stmt.params["filter_userId"], json!(USER_ID));

    let stmt = adapter
        .create_statement(
            &schema,
            "session",
            &record(json!({ "token": "t", "userId": USER_ID })),
            None,
        )
        .expect("create");
    assert!(stmt.text.contains(
        "user := (select users filter .id = <uuid>$params_userId)"
    ));
    assert!(stmt.text.starts_with("with module auth select (insert sessions {"));
}

#[test]
fn test_membership_on_identity() {
    let schema = auth_schema();
    let ids = json!([USER_ID, "not-a-uuid"]);

    let stmt = adapter(AdapterConfig::new("auth"))
        .delete_many_statement(&schema, "user", &[Where::new("id", Operator::In, ids)])
        .expect("statement");
    assert_eq!(
        stmt.text,
        "with module auth select count((delete user filter .id in array_unpack(<array<uuid>>$filter_id)))"
    );
    assert_eq!(
        stmt.params["filter_id"],
        json!([USER_ID, "00000000-0000-0000-0000-000000000000"])
    );

    let strict = adapter(AdapterConfig::new("auth").strict_ids(true));
    let err = strict
        .delete_statement(&schema, "user", &[Where::eq("id", "nope")])
        .unwrap_err();
    assert!(matches!(err, GelError::InvalidIdentity { .. }));
}

#[test]
fn test_null_filters_and_payloads() {
    let schema = auth_schema();
    let stmt = adapter(AdapterConfig::new("auth"))
        .update_statement(
            &schema,
            "user",
            &[Where::eq("name", Value::Null)],
            &record(json!({ "name": null, "email_verified": false })),
        )
        .expect("statement");

    assert!(stmt.text.contains("filter not exists .name set"));
    assert!(stmt.text.contains("name := {}"));
    assert!(stmt.text.contains("emailVerified := <bool>$params_email_verified"));
    assert_eq!(stmt.params.len(), 1);
}

#[test]
fn test_dates_are_normalized() {
    let schema = auth_schema();
    let stmt = adapter(AdapterConfig::new("auth"))
        .delete_statement(
            &schema,
            "session",
            &[Where::new("expiresAt", Operator::Lt, "2024-05-01T12:00:00+02:00")],
        )
        .expect("statement");
    assert_eq!(
        stmt.params["filter_expiresAt"],
        json!("2024-05-01T10:00:00Z")
    );
}

#[test]
fn test_pattern_on_non_text_field_is_rejected() {
    let schema = auth_schema();
    let err = adapter(AdapterConfig::new("auth"))
        .count_statement(
            &schema,
            "user",
            &[Where::new("createdAt", Operator::Contains, "2024")],
        )
        .unwrap_err();
    assert!(matches!(err, GelError::Unsupported(_)));
}

#[test]
fn test_unknown_field_is_rejected() {
    let schema = auth_schema();
    let err = adapter(AdapterConfig::new("auth"))
        .count_statement(&schema, "user", &[Where::eq("nickname", "x")])
        .unwrap_err();
    assert!(matches!(err, GelError::FieldNotFound { .. }));
}

#[test]
fn test_schema_emission() {
    let schema = auth_schema();
    let config = AdapterConfig::from_toml_str(
        r#"
        module_name = "auth"

        [indexes]
        session = ["userId", "expiresAt"]
        "#,
    )
    .expect("config");
    let adapter = adapter(config);

    let first = adapter.create_schema(&schema, None).expect("schema");
    let second = adapter.create_schema(&schema, None).expect("schema");
    assert_eq!(first, second);

    let code = &first.code;
    assert_eq!(code.matches("scalar type Role extending enum<admin, member>;").count(), 1);
    assert!(code.contains("required user: user {\n      on target delete delete source;\n    }"));
    assert!(code.contains("userId := .user.id;"));
    assert!(code.contains("index on (.expiresAt);"));
    assert!(!code.contains("index on (.userId);"));
    assert!(code.ends_with("}\n"));
}

#[test]
fn test_schema_file_is_written() {
    let schema = auth_schema();
    let dir = std::env::temp_dir().join(format!("gel-auth-test-{}", std::process::id()));
    let file = adapter(AdapterConfig::new("auth"))
        .create_schema(&schema, None)
        .expect("schema");

    let path = file.write(&dir).expect("write");
    assert_eq!(path, dir.join("dbschema/auth.gel"));
    assert_eq!(std::fs::read_to_string(&path).expect("read"), file.code);

    std::fs::remove_dir_all(&dir).ok();
}
