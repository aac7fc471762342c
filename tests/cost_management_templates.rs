//! Cost Management template integration tests
//!
//! Exercises the full gate → resolver → renderer path against the built-in
//! OpenShift Cost Management templates.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use notifications_engine::feature_flags::{FeatureFlagGate, FlagScope};
use notifications_engine::notification::{Action, Event, NotificationDispatcher};
use notifications_engine::template::builtin::{
    CM_OPERATOR_DATA_PROCESSED, CM_OPERATOR_DATA_RECEIVED, CM_OPERATOR_STALE,
    COST_MANAGEMENT_APPLICATION, COST_MANAGEMENT_BUNDLE, COST_MODEL_CREATE, COST_MODEL_REMOVE,
    COST_MODEL_UPDATE, DEFAULT_LOGO_URL, HCC_LOGO_TARGET, MISSING_COST_MODEL,
};
use notifications_engine::template::{
    cost_management_templates, TemplateError, TemplateRegistry, TemplateRenderer,
    TemplateResolver, VersionTag,
};

const SOURCE_NAME: &str = "Dummy source name";
const COST_MODEL_NAME: &str = "Sample model";

const ALL_EVENT_TYPES: [&str; 7] = [
    MISSING_COST_MODEL,
    COST_MODEL_CREATE,
    COST_MODEL_UPDATE,
    COST_MODEL_REMOVE,
    CM_OPERATOR_STALE,
    CM_OPERATOR_DATA_PROCESSED,
    CM_OPERATOR_DATA_RECEIVED,
];

struct TestEnvironment {
    resolver: TemplateResolver,
    renderer: TemplateRenderer,
    dispatcher: NotificationDispatcher,
}

fn create_test_environment() -> TestEnvironment {
    let registry = Arc::new(TemplateRegistry::default());
    registry.migrate(cost_management_templates()).unwrap();

    let resolver = TemplateResolver::new(registry);
    let renderer = TemplateRenderer::default();
    let dispatcher = NotificationDispatcher::new(
        resolver.clone(),
        renderer.clone(),
        Arc::new(FeatureFlagGate::default()),
    );

    TestEnvironment {
        resolver,
        renderer,
        dispatcher,
    }
}

fn cost_management_action(event_type: &str) -> Action {
    Action::builder(COST_MANAGEMENT_BUNDLE, COST_MANAGEMENT_APPLICATION, event_type)
        .timestamp(Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap())
        .org_id("org-1")
        .context("sourceName", SOURCE_NAME)
        .context("costModelName", COST_MODEL_NAME)
        .event(Event::with_payload(json!({"cluster_id": "cluster-a"})))
        .build()
}

fn render(env: &TestEnvironment, event_type: &str, version: VersionTag) -> (String, String) {
    let template = env
        .resolver
        .resolve(
            COST_MANAGEMENT_BUNDLE,
            COST_MANAGEMENT_APPLICATION,
            event_type,
            version,
        )
        .unwrap();
    let rendered = env
        .renderer
        .render(&template, &cost_management_action(event_type))
        .unwrap();
    assert_eq!(rendered.version, version);
    (rendered.subject, rendered.body)
}

// ============================================================================
// Per-event fixtures
// ============================================================================

#[test]
fn test_missing_cost_model_legacy() {
    let env = create_test_environment();
    let (subject, body) = render(&env, MISSING_COST_MODEL, VersionTag::Legacy);

    assert_eq!(subject, "Source missing Cost Model");
    assert!(body.contains("OpenShift source Dummy source name has no assigned cost model"));
    assert!(!body.contains(HCC_LOGO_TARGET));
}

#[test]
fn test_missing_cost_model_v2() {
    let env = create_test_environment();
    let (subject, body) = render(&env, MISSING_COST_MODEL, VersionTag::V2);

    assert_eq!(
        subject,
        "Instant notification - Missing cost model- Cost management - OpenShift"
    );
    assert!(body.contains("OpenShift source Dummy source name has no assigned cost model"));
    assert!(body.contains(HCC_LOGO_TARGET));
}

#[test]
fn test_cost_model_lifecycle_bodies() {
    let env = create_test_environment();

    for (event_type, verb, legacy_subject, v2_subject) in [
        (
            COST_MODEL_CREATE,
            "created",
            "Cost Management cost model changed",
            "Instant notification - Cost model changed - Cost management - OpenShift",
        ),
        (
            COST_MODEL_UPDATE,
            "updated",
            "Cost Management cost model update",
            "Instant notification - Cost model update - Cost management - OpenShift",
        ),
        (
            COST_MODEL_REMOVE,
            "removed",
            "Cost Management cost model removal",
            "Instant notification - Cost model removal - Cost management - OpenShift",
        ),
    ] {
        let (subject, body) = render(&env, event_type, VersionTag::Legacy);
        assert_eq!(subject, legacy_subject);
        assert!(body.contains(&format!("Cost model Sample model has been {}.", verb)));

        // v2 drops the trailing period
        let (subject, body) = render(&env, event_type, VersionTag::V2);
        assert_eq!(subject, v2_subject);
        assert!(body.contains(&format!("Cost model Sample model has been {}", verb)));
        assert!(!body.contains(&format!("Cost model Sample model has been {}.", verb)));
        assert!(body.contains(HCC_LOGO_TARGET));
    }
}

#[test]
fn test_operator_stale() {
    let env = create_test_environment();

    let (subject, body) = render(&env, CM_OPERATOR_STALE, VersionTag::Legacy);
    assert_eq!(subject, "Stale OpenShift cluster for Cost Management");
    assert!(body.contains(
        "OpenShift source Dummy source name has not received any payloads in the last 3 or more days"
    ));

    let (subject, body) = render(&env, CM_OPERATOR_STALE, VersionTag::V2);
    assert_eq!(
        subject,
        "Instant notification - Stale cost management - Cost management - OpenShift"
    );
    assert!(body.contains("in the last 3 or more days"));
}

#[test]
fn test_operator_stale_pluralizes_days() {
    let env = create_test_environment();
    let template = env
        .resolver
        .resolve(
            COST_MANAGEMENT_BUNDLE,
            COST_MANAGEMENT_APPLICATION,
            CM_OPERATOR_STALE,
            VersionTag::Legacy,
        )
        .unwrap();

    let one_day = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        CM_OPERATOR_STALE,
    )
    .context("sourceName", SOURCE_NAME)
    .context("staleDays", 1)
    .build();

    let rendered = env.renderer.render(&template, &one_day).unwrap();
    assert!(rendered.body.contains("in the last 1 or more day."));
}

#[test]
fn test_operator_data_events_list_clusters() {
    let env = create_test_environment();

    let (subject, body) = render(&env, CM_OPERATOR_DATA_PROCESSED, VersionTag::Legacy);
    assert_eq!(subject, "OpenShift cluster data processed by Cost Management");
    assert!(body.contains("Cost Management has completed processing for OpenShift source"));
    assert!(body.contains("<li>Cluster cluster-a</li>"));

    let (subject, body) = render(&env, CM_OPERATOR_DATA_RECEIVED, VersionTag::V2);
    assert_eq!(
        subject,
        "Instant notification - OpenShift cluster data received - Cost management - OpenShift"
    );
    assert!(body.contains(
        "OpenShift source Dummy source name has received a new payload and processing should begin shortly"
    ));
    assert!(body.contains("<li>Cluster cluster-a</li>"));
}

#[test]
fn test_v2_headings() {
    let env = create_test_environment();

    for (event_type, heading) in [
        (MISSING_COST_MODEL, "Missing cost model"),
        (COST_MODEL_CREATE, "Cost model changed"),
        (COST_MODEL_UPDATE, "Cost model update"),
        (COST_MODEL_REMOVE, "Cost model removal"),
        (CM_OPERATOR_STALE, "Stale cost management"),
        (CM_OPERATOR_DATA_PROCESSED, "OpenShift cluster data processed"),
        (CM_OPERATOR_DATA_RECEIVED, "OpenShift cluster data received"),
    ] {
        let (_, body) = render(&env, event_type, VersionTag::V2);
        assert!(
            body.contains(&format!("<h2>{}</h2>", heading)),
            "{} heading",
            event_type
        );
        assert!(!body.contains("- Cost management</h2>"), "{}", event_type);
    }
}

// ============================================================================
// Cross-cutting properties
// ============================================================================

#[test]
fn test_every_event_renders_in_both_versions() {
    let env = create_test_environment();

    for event_type in ALL_EVENT_TYPES {
        for version in [VersionTag::Legacy, VersionTag::V2] {
            let (subject, body) = render(&env, event_type, version);
            assert!(!subject.is_empty(), "{} {} subject", event_type, version);
            assert!(!body.is_empty(), "{} {} body", event_type, version);
        }
    }
}

#[test]
fn test_rendering_is_idempotent() {
    let env = create_test_environment();

    for event_type in ALL_EVENT_TYPES {
        for version in [VersionTag::Legacy, VersionTag::V2] {
            assert_eq!(
                render(&env, event_type, version),
                render(&env, event_type, version)
            );
        }
    }
}

#[test]
fn test_unknown_event_type_not_found() {
    let env = create_test_environment();

    let err = env
        .resolver
        .resolve(
            "openshift",
            "cost-management",
            "nonexistent-event",
            VersionTag::Legacy,
        )
        .unwrap_err();
    assert!(matches!(err, TemplateError::NotFound { .. }));
}

#[test]
fn test_context_values_are_html_escaped() {
    let env = create_test_environment();
    let template = env
        .resolver
        .resolve(
            COST_MANAGEMENT_BUNDLE,
            COST_MANAGEMENT_APPLICATION,
            MISSING_COST_MODEL,
            VersionTag::V2,
        )
        .unwrap();

    let action = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        MISSING_COST_MODEL,
    )
    .context("sourceName", "<script>alert('x')</script>")
    .build();

    let rendered = env.renderer.render(&template, &action).unwrap();
    assert!(!rendered.body.contains("<script>"));
    assert!(rendered
        .body
        .contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
}

#[test]
fn test_logo_url_raw_field_defaults_and_overrides() {
    let env = create_test_environment();
    let template = env
        .resolver
        .resolve(
            COST_MANAGEMENT_BUNDLE,
            COST_MANAGEMENT_APPLICATION,
            MISSING_COST_MODEL,
            VersionTag::V2,
        )
        .unwrap();

    // Missing raw field falls back to the template default
    let without_logo = cost_management_action(MISSING_COST_MODEL);
    let rendered = env.renderer.render(&template, &without_logo).unwrap();
    assert!(rendered.body.contains(&format!("src=\"{}\"", DEFAULT_LOGO_URL)));

    // Raw content is not escaped
    let custom = "https://cdn.example.com/logo.png?size=large&theme=dark";
    let with_logo = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        MISSING_COST_MODEL,
    )
    .context("sourceName", SOURCE_NAME)
    .context("logoUrl", custom)
    .build();
    let rendered = env.renderer.render(&template, &with_logo).unwrap();
    assert!(rendered.body.contains(&format!("src=\"{}\"", custom)));
}

#[test]
fn test_missing_required_field() {
    let env = create_test_environment();

    let without_source = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        MISSING_COST_MODEL,
    )
    .build();
    match env.dispatcher.dispatch(&without_source).unwrap_err() {
        TemplateError::RequiredFieldMissing {
            field,
            descriptor,
            version,
        } => {
            assert_eq!(field, "action.context.sourceName");
            assert_eq!(descriptor.event_type, MISSING_COST_MODEL);
            assert_eq!(version, VersionTag::Legacy);
        }
        other => panic!("Expected RequiredFieldMissing, got {:?}", other),
    }

    let without_model = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        COST_MODEL_UPDATE,
    )
    .context("sourceName", SOURCE_NAME)
    .build();
    assert!(matches!(
        env.dispatcher.dispatch(&without_model),
        Err(TemplateError::RequiredFieldMissing { .. })
    ));
}

// ============================================================================
// Feature-flag switching
// ============================================================================

#[test]
fn test_flag_toggle_switches_version() {
    let env = create_test_environment();
    let gate = env.dispatcher.gate();
    let action = cost_management_action(MISSING_COST_MODEL);

    // Legacy before any toggle
    let before = env.dispatcher.dispatch(&action).unwrap();
    assert_eq!(before.version, VersionTag::Legacy);
    assert_eq!(before.subject, "Source missing Cost Model");

    gate.set_feature_flag(FlagScope::Global, true);
    let after = env.dispatcher.dispatch(&action).unwrap();
    assert_eq!(after.version, VersionTag::V2);

    // Already-rendered output is unaffected by the toggle
    assert_eq!(before.subject, "Source missing Cost Model");

    // A tenant override wins over the global flag
    gate.set_feature_flag(FlagScope::tenant("org-1"), false);
    assert_eq!(
        env.dispatcher.dispatch(&action).unwrap().version,
        VersionTag::Legacy
    );

    let other_tenant = Action::builder(
        COST_MANAGEMENT_BUNDLE,
        COST_MANAGEMENT_APPLICATION,
        MISSING_COST_MODEL,
    )
    .org_id("org-2")
    .context("sourceName", SOURCE_NAME)
    .build();
    assert_eq!(
        env.dispatcher.dispatch(&other_tenant).unwrap().version,
        VersionTag::V2
    );
}

#[test]
fn test_flag_toggle_never_changes_registered_templates() {
    let env = create_test_environment();
    let registry = env.resolver.registry().clone();
    let descriptors = registry.descriptors();
    let generation = registry.generation();

    env.dispatcher
        .gate()
        .set_feature_flag(FlagScope::Global, true);
    env.dispatcher
        .gate()
        .set_feature_flag(FlagScope::Global, false);

    assert_eq!(registry.descriptors(), descriptors);
    assert_eq!(registry.generation(), generation);
}
