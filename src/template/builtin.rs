//! Built-in instant-notification templates for OpenShift Cost Management
//!
//! Each event type ships a legacy and a v2 cohort. v2 bodies share a
//! console-branded layout that embeds the console logo.

use super::types::{EventTypeDescriptor, TemplateDefinition, VersionTag};

pub const COST_MANAGEMENT_BUNDLE: &str = "openshift";
pub const COST_MANAGEMENT_APPLICATION: &str = "cost-management";

pub const MISSING_COST_MODEL: &str = "missing-cost-model";
pub const COST_MODEL_CREATE: &str = "cost-model-create";
pub const COST_MODEL_UPDATE: &str = "cost-model-update";
pub const COST_MODEL_REMOVE: &str = "cost-model-remove";
pub const CM_OPERATOR_STALE: &str = "cm-operator-stale";
pub const CM_OPERATOR_DATA_PROCESSED: &str = "cm-operator-data-processed";
pub const CM_OPERATOR_DATA_RECEIVED: &str = "cm-operator-data-received";

/// File name of the console logo; every v2 body links to it
pub const HCC_LOGO_TARGET: &str = "Logo-Red_Hat-Hybrid_Cloud_Console-A-Reverse-RGB.png";

/// Logo used when the action does not carry `logoUrl`
pub const DEFAULT_LOGO_URL: &str = "https://console.redhat.com/apps/frontend-assets/email-assets/Logo-Red_Hat-Hybrid_Cloud_Console-A-Reverse-RGB.png";

const SOURCE_NAME: &str = "action.context.sourceName";
const COST_MODEL_NAME: &str = "action.context.costModelName";

const LEGACY_HEADER: &str = r#"<html><body><div class="cm-instant">"#;

const LEGACY_FOOTER: &str = r#"<p><a href="{{ environment.url }}/openshift/cost-management" target="_blank">Open Cost Management</a></p></div></body></html>"#;

const V2_HEADER: &str = r#"<html><body><table class="hcc-email" width="100%"><tr><td class="hcc-header"><img src="{{{ action.context.logoUrl | default:""#;

const V2_HEADER_END: &str = r#"" }}}" alt="Red Hat Hybrid Cloud Console" width="240"></td></tr><tr><td class="hcc-content">"#;

const V2_FOOTER: &str = r#"<p><a href="{{ environment.url }}/openshift/cost-management" target="_blank">Open Cost Management</a></p></td></tr><tr><td class="hcc-footer">This is an instant notification from Red Hat Hybrid Cloud Console.</td></tr></table></body></html>"#;

const CLUSTER_LIST: &str = r#"{% if action.events %}<ul>{% for event in action.events %}<li>Cluster {{ event.payload.cluster_id | default:"unknown" }}</li>{% endfor %}</ul>{% endif %}"#;

const STALE_PERIOD: &str = r#"{{ action.context.staleDays | default:3 }} or more {{ action.context.staleDays | default:3 | pluralize:"day","days" }}"#;

struct Fixture {
    event_type: &'static str,
    legacy_subject: &'static str,
    v2_subject: &'static str,
    /// `<h2>` heading of the v2 layout
    v2_title: &'static str,
    legacy_content: String,
    v2_content: String,
    required_field: &'static str,
}

fn legacy_body(content: &str) -> String {
    [LEGACY_HEADER, content, LEGACY_FOOTER].concat()
}

fn v2_body(title: &str, content: &str) -> String {
    [
        V2_HEADER,
        DEFAULT_LOGO_URL,
        V2_HEADER_END,
        "<h2>",
        title,
        "</h2>",
        content,
        V2_FOOTER,
    ]
    .concat()
}

fn cost_model_sentence(verb: &str, period: &str) -> String {
    [
        "<p>Cost model {{ action.context.costModelName | trim }} has been ",
        verb,
        period,
        "</p>",
    ]
    .concat()
}

fn fixtures() -> Vec<Fixture> {
    let missing = "<p>OpenShift source {{ action.context.sourceName }} has no assigned cost model. Assign a cost model to this source to see cost information.</p>";
    let stale = format!(
        "<p>OpenShift source {{{{ action.context.sourceName }}}} has not received any payloads in the last {}.</p>",
        STALE_PERIOD
    );
    let processed = format!(
        "<p>Cost Management has completed processing for OpenShift source {{{{ action.context.sourceName }}}}.</p>{}",
        CLUSTER_LIST
    );
    let received = format!(
        "<p>OpenShift source {{{{ action.context.sourceName }}}} has received a new payload and processing should begin shortly.</p>{}",
        CLUSTER_LIST
    );

    vec![
        Fixture {
            event_type: MISSING_COST_MODEL,
            legacy_subject: "Source missing Cost Model",
            v2_subject: "Instant notification - Missing cost model- Cost management - OpenShift",
            v2_title: "Missing cost model",
            legacy_content: missing.to_string(),
            v2_content: missing.to_string(),
            required_field: SOURCE_NAME,
        },
        Fixture {
            event_type: COST_MODEL_CREATE,
            legacy_subject: "Cost Management cost model changed",
            v2_subject: "Instant notification - Cost model changed - Cost management - OpenShift",
            v2_title: "Cost model changed",
            legacy_content: cost_model_sentence("created", "."),
            v2_content: cost_model_sentence("created", ""),
            required_field: COST_MODEL_NAME,
        },
        Fixture {
            event_type: COST_MODEL_UPDATE,
            legacy_subject: "Cost Management cost model update",
            v2_subject: "Instant notification - Cost model update - Cost management - OpenShift",
            v2_title: "Cost model update",
            legacy_content: cost_model_sentence("updated", "."),
            v2_content: cost_model_sentence("updated", ""),
            required_field: COST_MODEL_NAME,
        },
        Fixture {
            event_type: COST_MODEL_REMOVE,
            legacy_subject: "Cost Management cost model removal",
            v2_subject: "Instant notification - Cost model removal - Cost management - OpenShift",
            v2_title: "Cost model removal",
            legacy_content: cost_model_sentence("removed", "."),
            v2_content: cost_model_sentence("removed", ""),
            required_field: COST_MODEL_NAME,
        },
        Fixture {
            event_type: CM_OPERATOR_STALE,
            legacy_subject: "Stale OpenShift cluster for Cost Management",
            v2_subject: "Instant notification - Stale cost management - Cost management - OpenShift",
            v2_title: "Stale cost management",
            legacy_content: stale.clone(),
            v2_content: stale,
            required_field: SOURCE_NAME,
        },
        Fixture {
            event_type: CM_OPERATOR_DATA_PROCESSED,
            legacy_subject: "OpenShift cluster data processed by Cost Management",
            v2_subject: "Instant notification - OpenShift cluster data processed - Cost management - OpenShift",
            v2_title: "OpenShift cluster data processed",
            legacy_content: processed.clone(),
            v2_content: processed,
            required_field: SOURCE_NAME,
        },
        Fixture {
            event_type: CM_OPERATOR_DATA_RECEIVED,
            legacy_subject: "OpenShift cluster data received by Cost Management",
            v2_subject: "Instant notification - OpenShift cluster data received - Cost management - OpenShift",
            v2_title: "OpenShift cluster data received",
            legacy_content: received.clone(),
            v2_content: received,
            required_field: SOURCE_NAME,
        },
    ]
}

/// Legacy and v2 definitions for every Cost Management event type
pub fn cost_management_templates() -> Vec<TemplateDefinition> {
    fixtures()
        .into_iter()
        .flat_map(|fixture| {
            let descriptor = EventTypeDescriptor::new(
                COST_MANAGEMENT_BUNDLE,
                COST_MANAGEMENT_APPLICATION,
                fixture.event_type,
            );
            [
                TemplateDefinition::new(
                    descriptor.clone(),
                    VersionTag::Legacy,
                    fixture.legacy_subject,
                    legacy_body(&fixture.legacy_content),
                )
                .require(fixture.required_field),
                TemplateDefinition::new(
                    descriptor,
                    VersionTag::V2,
                    fixture.v2_subject,
                    v2_body(fixture.v2_title, &fixture.v2_content),
                )
                .require(fixture.required_field),
            ]
        })
        .collect()
}
