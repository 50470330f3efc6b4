//! Validation Tests
//!
//! Identifier shapes, wire enums and interaction payload checks. None of
//! these need a database.

use axum::http::StatusCode;
use serde_json::json;
use vitrina::app::interactions::{InteractionError, ValidatedInteraction, MAX_COMMENT_CHARS};
use vitrina::config::AppMode;
use vitrina::domain::ids::{
    is_temp_id, is_valid_public_id, is_valid_slug, new_public_id, new_temp_id, PUBLIC_ID_LEN,
};
use vitrina::domain::interaction::{
    ErrorCode, Interaction, InteractionRequest, InteractionResponse, ReactionKind,
};
use vitrina::domain::post::PostCounters;
use vitrina::http::AppError;
use vitrina::infra::storage::MediaLinks;

// ===========================================================================
// Identifiers
// ===========================================================================

#[test]
fn generated_ids_are_valid() {
    for _ in 0..100 {
        let id = new_public_id();
        assert_eq!(id.len(), PUBLIC_ID_LEN);
        assert!(is_valid_public_id(&id), "{}", id);
    }
}

#[test]
fn malformed_ids_are_rejected() {
    assert!(!is_valid_public_id(""));
    assert!(!is_valid_public_id("abc"));
    assert!(!is_valid_public_id(&"A".repeat(PUBLIC_ID_LEN)));
    assert!(!is_valid_public_id(&format!("1{}", "a".repeat(PUBLIC_ID_LEN - 1))));
    assert!(!is_valid_public_id(&format!("a{}", "-".repeat(PUBLIC_ID_LEN - 1))));
}

#[test]
fn slugs() {
    assert!(is_valid_slug("acme-shoes"));
    assert!(is_valid_slug("a1"));
    assert!(!is_valid_slug(""));
    assert!(!is_valid_slug("-acme"));
    assert!(!is_valid_slug("acme-"));
    assert!(!is_valid_slug("Acme"));
    assert!(!is_valid_slug("acme_shoes"));
    assert!(!is_valid_slug(&"a".repeat(65)));
}

#[test]
fn temporary_ids_never_look_like_server_ids() {
    let temp = new_temp_id();
    assert!(is_temp_id(&temp));
    assert!(!is_valid_public_id(&temp));
    assert!(!is_temp_id(&new_public_id()));
}

// ===========================================================================
// Wire Format
// ===========================================================================

#[test]
fn reaction_kinds_parse_from_screaming_case() {
    for kind in ReactionKind::ALL {
        assert_eq!(kind.as_wire().parse::<ReactionKind>(), Ok(kind));
        assert_eq!(ReactionKind::from_db(kind.as_db()), Some(kind));
    }
    assert!("like".parse::<ReactionKind>().is_err());
}

#[test]
fn request_body_uses_camel_case() {
    let request: InteractionRequest = serde_json::from_value(json!({
        "postId": "p",
        "kind": "REACTION",
        "reactionKind": null
    }))
    .unwrap();
    assert_eq!(request, InteractionRequest::reaction("p", None));

    let encoded = serde_json::to_value(InteractionRequest::comment("p", "hi")).unwrap();
    assert_eq!(encoded["commentText"], "hi");
    assert_eq!(encoded["kind"], "COMMENT");
}

#[test]
fn failure_envelope_shape() {
    let encoded =
        serde_json::to_value(InteractionResponse::failure(ErrorCode::PostNotFound, "gone")).unwrap();
    assert_eq!(
        encoded,
        json!({ "ok": false, "message": "gone", "code": "post_not_found" })
    );

    let encoded = serde_json::to_value(InteractionResponse::success(
        "post shared",
        PostCounters {
            like_count: 1,
            comment_count: 2,
            share_count: 3,
        },
    ))
    .unwrap();
    assert_eq!(encoded["counters"]["shareCount"], 3);
}

// ===========================================================================
// Interaction Payloads
// ===========================================================================

#[test]
fn validates_each_kind() {
    let post_id = new_public_id();

    let validated =
        ValidatedInteraction::try_from(InteractionRequest::reaction(&post_id, Some(ReactionKind::Wow)))
            .unwrap();
    assert_eq!(validated.interaction, Interaction::Reaction(Some(ReactionKind::Wow)));

    let validated = ValidatedInteraction::try_from(InteractionRequest::comment(&post_id, "  hey  ")).unwrap();
    assert_eq!(validated.interaction, Interaction::Comment("hey".into()));

    let validated = ValidatedInteraction::try_from(InteractionRequest::share(&post_id)).unwrap();
    assert_eq!(validated.interaction, Interaction::Share);
}

#[test]
fn rejects_bad_payloads() {
    let post_id = new_public_id();

    let err = ValidatedInteraction::try_from(InteractionRequest::share("nope")).unwrap_err();
    assert!(matches!(err, InteractionError::InvalidPostId));

    let mut request = InteractionRequest::reaction(&post_id, None);
    request.reaction_kind = Some("HAHA".into());
    let err = ValidatedInteraction::try_from(request).unwrap_err();
    assert!(matches!(err, InteractionError::InvalidReactionKind(ref kind) if kind == "HAHA"));
    assert_eq!(err.code(), ErrorCode::Validation);

    let err = ValidatedInteraction::try_from(InteractionRequest::comment(&post_id, " \n ")).unwrap_err();
    assert!(matches!(err, InteractionError::EmptyComment));

    let long = "é".repeat(MAX_COMMENT_CHARS + 1);
    let err = ValidatedInteraction::try_from(InteractionRequest::comment(&post_id, long)).unwrap_err();
    assert!(matches!(err, InteractionError::CommentTooLong));

    // Characters, not bytes.
    let exact = "é".repeat(MAX_COMMENT_CHARS);
    assert!(ValidatedInteraction::try_from(InteractionRequest::comment(&post_id, exact)).is_ok());
}

// ===========================================================================
// Media Links
// ===========================================================================

#[test]
fn avatar_keys_resolve_against_base_url() {
    let links = MediaLinks::from_base("https://cdn.example.com/media").unwrap();
    assert_eq!(
        links.public_url("avatars/a.jpg").as_deref(),
        Some("https://cdn.example.com/media/avatars/a.jpg")
    );
    assert_eq!(
        links.public_url("https://elsewhere.test/x.png").as_deref(),
        Some("https://elsewhere.test/x.png")
    );
    assert_eq!(links.public_url(""), None);
    assert_eq!(MediaLinks::default().public_url("avatars/a.jpg"), None);
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn app_mode_parses_known_values_only() {
    assert_eq!("api".parse::<AppMode>().unwrap(), AppMode::Api);
    assert_eq!("worker".parse::<AppMode>().unwrap(), AppMode::Worker);
    assert!("Worker".parse::<AppMode>().is_err());
    assert!("".parse::<AppMode>().is_err());
}

// ===========================================================================
// HTTP Error Mapping
// ===========================================================================

#[test]
fn interaction_errors_map_to_status_and_code() {
    let cases = [
        (InteractionError::InvalidPostId, StatusCode::BAD_REQUEST, ErrorCode::Validation),
        (InteractionError::EmptyComment, StatusCode::BAD_REQUEST, ErrorCode::Validation),
        (InteractionError::PostNotFound, StatusCode::NOT_FOUND, ErrorCode::PostNotFound),
        (
            InteractionError::DuplicateReaction,
            StatusCode::CONFLICT,
            ErrorCode::DuplicateReaction,
        ),
        (
            InteractionError::ReactionNotFound,
            StatusCode::CONFLICT,
            ErrorCode::ReactionNotFound,
        ),
        (
            InteractionError::Storage(sqlx::Error::RowNotFound),
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
        ),
    ];

    for (err, status, code) in cases {
        let app_error = AppError::from(err);
        assert_eq!(app_error.status(), status);
        assert_eq!(app_error.code(), code);
    }
}
