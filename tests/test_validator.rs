mod common;

use common::object;
use crud_generator::domain::config::{CreatableField, FieldValidation, UpdatableField};
use crud_generator::validate;
use pretty_assertions::assert_eq;
use serde_json::json;

fn creatable(field: &str, required: bool, validation: Option<FieldValidation>) -> CreatableField {
    CreatableField {
        field: field.to_string(),
        label: field.to_string(),
        required,
        default_type: None,
        default_value: None,
        validation,
    }
}

fn signup_rules() -> Vec<CreatableField> {
    vec![
        creatable("username", true, None),
        creatable(
            "bio",
            false,
            Some(FieldValidation {
                max_length: Some(10),
                ..Default::default()
            }),
        ),
        creatable(
            "zip",
            false,
            Some(FieldValidation {
                pattern: Some(r"^\d{5}$".into()),
                ..Default::default()
            }),
        ),
    ]
}

#[test]
fn test_collects_every_violation() {
    let data = object(json!({
        "bio": "far too long for the limit",
        "zip": "ABCDE"
    }));
    let errors = validate(&data, &signup_rules());

    assert_eq!(errors.len(), 3);
    let summary: Vec<(&str, &str, &str)> = errors
        .iter()
        .map(|e| (e.field.as_str(), e.tag.as_str(), e.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("username", "required", "Field 'username' is required"),
            ("bio", "max_length", "Field 'bio' must be at most 10 characters long"),
            ("zip", "pattern", "Field 'zip' format is invalid"),
        ]
    );
}

#[test]
fn test_valid_payload_has_no_errors() {
    let data = object(json!({"username": "ann", "bio": "hi", "zip": "12345"}));
    assert!(validate(&data, &signup_rules()).is_empty());
}

#[test]
fn test_blank_optional_fields_are_skipped() {
    let rules = vec![creatable(
        "nickname",
        false,
        Some(FieldValidation {
            min_length: Some(3),
            ..Default::default()
        }),
    )];
    for data in [json!({}), json!({"nickname": null}), json!({"nickname": ""})] {
        assert!(validate(&object(data), &rules).is_empty());
    }

    let required = vec![creatable("nickname", true, None)];
    let errors = validate(&object(json!({"nickname": ""})), &required);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].value, json!(""));
}

#[test]
fn test_numeric_bounds_accept_any_representation() {
    let rules = vec![creatable(
        "qty",
        false,
        Some(FieldValidation {
            min: Some(1.0),
            max: Some(10.0),
            ..Default::default()
        }),
    )];

    for ok in [json!(1), json!(10.0), json!("5"), json!(" 7.5 ")] {
        assert!(
            validate(&object(json!({ "qty": ok.clone() })), &rules).is_empty(),
            "{} should pass",
            ok
        );
    }

    let cases = vec![
        (json!(0), "min", "Field 'qty' must be at least 1"),
        (json!("11"), "max", "Field 'qty' must be at most 10"),
        (json!("lots"), "numeric", "Field 'qty' must be a number"),
        (json!(true), "numeric", "Field 'qty' must be a number"),
    ];
    for (value, tag, message) in cases {
        let errors = validate(&object(json!({ "qty": value })), &rules);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].tag, tag);
        assert_eq!(errors[0].message, message);
    }
}

#[test]
fn test_length_counts_characters() {
    let rules = vec![creatable(
        "city",
        false,
        Some(FieldValidation {
            min_length: Some(2),
            max_length: Some(4),
            ..Default::default()
        }),
    )];
    assert!(validate(&object(json!({"city": "Köln"})), &rules).is_empty());
    assert_eq!(validate(&object(json!({"city": "Z"})), &rules)[0].tag, "min_length");
    assert_eq!(validate(&object(json!({"city": "Zürich"})), &rules)[0].tag, "max_length");
}

#[test]
fn test_custom_message_overrides_rule_messages() {
    let rules = vec![UpdatableField {
        field: "code".into(),
        label: "Code".into(),
        required: true,
        validation: Some(FieldValidation {
            min_length: Some(3),
            pattern: Some("^[A-Z]+$".into()),
            error_message: Some("use 3+ capital letters".into()),
            ..Default::default()
        }),
    }];

    let errors = validate(&object(json!({"code": "a"})), &rules);
    let tags: Vec<&str> = errors.iter().map(|e| e.tag.as_str()).collect();
    assert_eq!(tags, vec!["min_length", "pattern"]);
    assert!(errors.iter().all(|e| e.message == "use 3+ capital letters"));

    // the required message is never overridden
    let errors = validate(&object(json!({})), &rules);
    assert_eq!(errors[0].message, "Field 'code' is required");
}
