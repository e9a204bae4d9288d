//! The `CarbonAwareJob` custom resource.
//!
//! A user submits a job template plus a flex window; the controller
//! owns the status block and drives the workload through
//! New -> Pending -> Scheduled -> Running -> Completed/Failed.

use k8s_openapi::api::batch::v1::JobSpec;
use k8s_openapi::api::batch::v1::JobStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::gen::SchemaGenerator;
use schemars::schema::InstanceType;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Schema for embedded `k8s-openapi` object types: an object that
/// keeps whatever the API server accepts for them.
fn preserve_arbitrary_object(_gen: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::json!(true),
    );
    Schema::Object(schema)
}

/// Schema for `metav1.Time` fields.
fn datetime_schema(_gen: &mut SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        format: Some("date-time".to_string()),
        ..Default::default()
    })
}

/// Schema for the condition list.
fn conditions_schema(gen: &mut SchemaGenerator) -> Schema {
    let mut array = SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        ..Default::default()
    };
    array.array().items = Some(preserve_arbitrary_object(gen).into());
    Schema::Object(array)
}

/// Finalizer added on first reconcile and removed only after the
/// child job is gone.
pub const FINALIZER: &str = "batch.carbon-aware-kube.dev/finalizer";

pub const CONDITION_SCHEDULED: &str = "Scheduled";
pub const CONDITION_STARTED: &str = "Started";
pub const CONDITION_COMPLETED: &str = "Completed";
pub const CONDITION_FAILED: &str = "Failed";

pub const REASON_FORECAST_EVALUATED: &str = "ForecastEvaluated";
pub const REASON_FALLBACK_SCHEDULING: &str = "FallbackScheduling";
pub const REASON_JOB_CREATED: &str = "JobCreated";
pub const REASON_JOB_ADOPTED: &str = "JobAdopted";
pub const REASON_JOB_SUCCEEDED: &str = "JobSucceeded";
pub const REASON_JOB_FAILED: &str = "JobFailed";

/// Desired state of a CarbonAwareJob.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "batch.carbon-aware-kube.dev",
    version = "v1alpha1",
    kind = "CarbonAwareJob",
    plural = "carbonawarejobs",
    shortname = "cajob",
    shortname = "carbonjob",
    status = "CarbonAwareJobStatus",
    namespaced,
    printcolumn = r#"{"name":"Scheduled","type":"string","jsonPath":".status.scheduledTime","description":"Time when the job is scheduled to run"}"#,
    printcolumn = r#"{"name":"Job","type":"string","jsonPath":".status.jobName","description":"Name of the created Job"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.schedulingState","description":"Current scheduling state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CarbonAwareJobSpec {
    /// Template for the job created once carbon intensity is optimal
    pub job_template: JobTemplateSpec,

    /// Maximum time the launch may be deferred from submission,
    /// e.g. `2h`, `90m` or `PT2H`
    pub max_delay: String,

    /// Expected task duration used for the intensity roll-up
    /// (defaults to one hour)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,

    /// Cloud region the job runs in (`provider:region`); detected
    /// from node labels when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Template for the child job, a subset of `batch/v1` JobTemplateSpec.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplateSpec {
    /// Labels and annotations merged onto the created job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_arbitrary_object")]
    pub metadata: Option<ObjectMeta>,

    /// Desired behavior of the job
    #[schemars(schema_with = "preserve_arbitrary_object")]
    pub spec: JobSpec,
}

/// Where a CarbonAwareJob is in its lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
pub enum SchedulingState {
    /// Freshly observed, not yet planned
    #[default]
    New,
    /// Planned, waiting for its start time
    Pending,
    /// Child job created
    Scheduled,
    /// Child job has active pods
    Running,
    /// Child job succeeded
    Completed,
    /// Child job failed or disappeared
    Failed,
}

/// Estimated carbon savings, rendered for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarbonSavings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vs_worst_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vs_naive_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vs_median_case: Option<String>,
}

/// Details of the carbon-aware scheduling decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingDecision {
    /// Optimal start time according to the forecast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "datetime_schema")]
    pub optimal_time: Option<Time>,

    /// Highest-intensity start time in the window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "datetime_schema")]
    pub worst_case_time: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_intensity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_case_intensity: Option<String>,

    /// Intensity if the job ran immediately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate_intensity: Option<String>,

    /// `carbon-aware-scheduler-api` or `fallback`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
}

/// Observed state of a CarbonAwareJob; owned by the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarbonAwareJobStatus {
    /// Set on first reconcile; immutable afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "datetime_schema")]
    pub submission_time: Option<Time>,

    /// Chosen start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "datetime_schema")]
    pub scheduled_time: Option<Time>,

    /// Name of the owned child job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,

    /// Last observed child-job status snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_arbitrary_object")]
    pub job_status: Option<JobStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_state: Option<SchedulingState>,

    /// Forecast intensity at the scheduled time, for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbon_intensity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbon_savings: Option<CarbonSavings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_decision: Option<SchedulingDecision>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_round_trips_through_json() {
        let spec = CarbonAwareJobSpec {
            job_template: JobTemplateSpec {
                metadata: None,
                spec: JobSpec::default(),
            },
            max_delay: "2h".to_string(),
            max_duration: Some("30m".to_string()),
            location: Some("gcp:us-west2".to_string()),
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["maxDelay"], "2h");
        assert_eq!(json["maxDuration"], "30m");
        assert_eq!(json["location"], "gcp:us-west2");
        assert!(json.get("jobTemplate").is_some());

        let back: CarbonAwareJobSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back.max_delay, "2h");
    }

    #[test]
    fn scheduling_state_serializes_as_pascal_case() {
        assert_eq!(
            serde_json::to_string(&SchedulingState::New).unwrap(),
            r#""New""#
        );
        assert_eq!(
            serde_json::to_string(&SchedulingState::Completed).unwrap(),
            r#""Completed""#
        );
    }

    #[test]
    fn crd_definition_generates() {
        use kube::CustomResourceExt;

        let crd = CarbonAwareJob::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("carbonawarejobs.batch.carbon-aware-kube.dev")
        );
        assert_eq!(crd.spec.names.kind, "CarbonAwareJob");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["cajob".to_string(), "carbonjob".to_string()])
        );
    }

    #[test]
    fn empty_status_serializes_to_empty_object() {
        let status = CarbonAwareJobStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
