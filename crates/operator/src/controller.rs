//! Level-triggered reconciliation of CarbonAwareJobs.
//!
//! Each reconcile observes the current workload, performs at most one
//! externally visible mutation, and requeues. Wall-clock waits are
//! expressed as requeue delays, never as in-process sleeps. Every
//! branch is idempotent under re-observation, so a crash between a
//! mutation and its status write is repaired by the next reconcile.

use core::error::Error;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use api_types::ScheduleResponse;
use chrono::DateTime;
use chrono::Duration;
use chrono::SecondsFormat;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::batch::v1::JobStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DeleteParams;
use kube::api::ListParams;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::api::PostParams;
use kube::runtime::controller::Action;
use kube::runtime::controller::Controller;
use kube::runtime::watcher;
use kube::Api;
use kube::Client;
use kube::Resource;
use kube::ResourceExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::crd::CarbonAwareJob;
use crate::crd::CarbonAwareJobStatus;
use crate::crd::CarbonSavings;
use crate::crd::SchedulingDecision;
use crate::crd::SchedulingState;
use crate::crd::CONDITION_COMPLETED;
use crate::crd::CONDITION_FAILED;
use crate::crd::CONDITION_SCHEDULED;
use crate::crd::CONDITION_STARTED;
use crate::crd::FINALIZER;
use crate::crd::REASON_FALLBACK_SCHEDULING;
use crate::crd::REASON_FORECAST_EVALUATED;
use crate::crd::REASON_JOB_ADOPTED;
use crate::crd::REASON_JOB_CREATED;
use crate::crd::REASON_JOB_FAILED;
use crate::crd::REASON_JOB_SUCCEEDED;
use crate::introspection;
use crate::scheduling_client::SchedulingClient;

const LABEL_NAME: &str = "app.kubernetes.io/name";
const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
const APP_NAME: &str = "carbon-aware-job";
const MANAGER_NAME: &str = "carbon-aware-operator";

const ANNOTATION_CARBON_INTENSITY: &str = "carbon-aware-kube.dev/carbon-intensity";
const ANNOTATION_SCHEDULED_TIME: &str = "carbon-aware-kube.dev/scheduled-time";
const ANNOTATION_SAVINGS_PCT: &str = "carbon-aware-kube.dev/carbon-savings-pct";
const ANNOTATION_PARENT_NAME: &str = "carbon-aware-kube.dev/parent-resource-name";
const ANNOTATION_PARENT_UID: &str = "carbon-aware-kube.dev/parent-resource-uid";

const FORECAST_SOURCE_API: &str = "carbon-aware-scheduler-api";
const FORECAST_SOURCE_FALLBACK: &str = "fallback";

const DEFAULT_LOCATION: &str = "aws:us-east-1";
const UNKNOWN_INTENSITY: &str = "unknown";
const ZERO_SAVINGS: &str = "0.00%";

const JOB_POLL_INTERVAL: StdDuration = StdDuration::from_secs(30);
const ERROR_REQUEUE: StdDuration = StdDuration::from_secs(5);

/// Registry failures surfaced out of a reconcile.
#[derive(Debug, derive_more::Display)]
pub enum ReconcileError {
    #[display("resource not found: {message}")]
    NotFound { message: String },
    #[display("conflicting write, the resource was modified concurrently: {message}")]
    Conflict { message: String },
    #[display("transient registry error: {message}")]
    Transient { message: String },
}

impl Error for ReconcileError {}

fn classify(error: kube::Error) -> ReconcileError {
    match &error {
        kube::Error::Api(ae) if ae.code == 404 => ReconcileError::NotFound {
            message: error.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 => ReconcileError::Conflict {
            message: error.to_string(),
        },
        _ => ReconcileError::Transient {
            message: error.to_string(),
        },
    }
}

/// Dependencies available to every reconcile.
pub struct Context {
    pub client: Client,
    pub scheduler: Arc<dyn SchedulingClient>,
}

/// Run the controller until shutdown.
pub async fn run(client: Client, scheduler: Arc<dyn SchedulingClient>) {
    let workloads: Api<CarbonAwareJob> = Api::all(client.clone());
    let jobs: Api<Job> = Api::all(client.clone());
    let context = Arc::new(Context { client, scheduler });

    Controller::new(workloads, watcher::Config::default())
        .owns(jobs, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(name = %object.name, "reconciled"),
                Err(e) => warn!("reconcile failed: {e}"),
            }
        })
        .await;
}

fn error_policy(
    _object: Arc<CarbonAwareJob>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!("requeueing after error: {error}");
    Action::requeue(ERROR_REQUEUE)
}

/// One pass of the state machine.
pub async fn reconcile(
    caj: Arc<CarbonAwareJob>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = caj.namespace().unwrap_or_default();
    let api: Api<CarbonAwareJob> = Api::namespaced(ctx.client.clone(), &namespace);
    let jobs: Api<Job> = Api::namespaced(ctx.client.clone(), &namespace);

    if caj.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&api, &jobs, &caj).await;
    }

    // First observation: stamp the submission time.
    if caj
        .status
        .as_ref()
        .and_then(|s| s.submission_time.as_ref())
        .is_none()
    {
        info!(name = %caj.name_any(), "initializing CarbonAwareJob status");
        let status = CarbonAwareJobStatus {
            submission_time: Some(Time(Utc::now())),
            scheduling_state: Some(SchedulingState::New),
            ..Default::default()
        };
        patch_status(&api, &caj.name_any(), &status).await?;
        return Ok(Action::requeue(StdDuration::ZERO));
    }

    if !caj.finalizers().iter().any(|f| f == FINALIZER) {
        info!(name = %caj.name_any(), "adding finalizer");
        add_finalizer(&api, &caj).await?;
        return Ok(Action::requeue(StdDuration::ZERO));
    }

    let status = caj.status.clone().unwrap_or_default();
    match status.scheduling_state.unwrap_or_default() {
        SchedulingState::New => handle_new(&api, &caj, &ctx, status).await,
        SchedulingState::Pending => handle_pending(&api, &jobs, &caj, status).await,
        SchedulingState::Scheduled | SchedulingState::Running => {
            handle_scheduled(&api, &jobs, &caj, status).await
        }
        SchedulingState::Completed | SchedulingState::Failed => Ok(Action::await_change()),
    }
}

/// New: plan the start time through the scheduling service, or fall
/// back to immediate execution when planning is impossible.
async fn handle_new(
    api: &Api<CarbonAwareJob>,
    caj: &CarbonAwareJob,
    ctx: &Context,
    mut status: CarbonAwareJobStatus,
) -> Result<Action, ReconcileError> {
    let now = Utc::now();
    let submission = status
        .submission_time
        .as_ref()
        .map(|t| t.0)
        .unwrap_or(now);
    let job_duration = job_duration_or_default(caj.spec.max_duration.as_deref());
    let location = match caj.spec.location.as_deref() {
        Some(location) if !location.is_empty() => location.to_string(),
        _ => default_location(&ctx.client).await,
    };

    match parse_flex_window(&caj.spec.max_delay) {
        Ok(max_delay) => {
            match ctx
                .scheduler
                .get_optimal_schedule(submission, max_delay, job_duration, &location)
                .await
            {
                Ok(response) => {
                    info!(
                        name = %caj.name_any(),
                        scheduled = %response.ideal.time,
                        co2 = response.ideal.co2_intensity,
                        "forecast evaluated"
                    );
                    apply_schedule_decision(&mut status, &response, now);
                }
                Err(report) => {
                    warn!(
                        name = %caj.name_any(),
                        "failed to get optimal schedule, scheduling immediately: {report:?}"
                    );
                    apply_fallback_decision(
                        &mut status,
                        submission,
                        &format!(
                            "Failed to get forecast: {}. Scheduling immediately.",
                            report.current_context()
                        ),
                        now,
                    );
                }
            }
        }
        Err(reason) => {
            warn!(name = %caj.name_any(), "invalid maxDelay, scheduling immediately: {reason}");
            apply_fallback_decision(
                &mut status,
                submission,
                &format!(
                    "Invalid maxDelay '{}': {reason}. Scheduling immediately.",
                    caj.spec.max_delay
                ),
                now,
            );
        }
    }

    patch_status(api, &caj.name_any(), &status).await?;
    Ok(requeue_at(&status, now))
}

/// Pending: wait for the start time, then create (or adopt) the
/// child job exactly once.
async fn handle_pending(
    api: &Api<CarbonAwareJob>,
    jobs: &Api<Job>,
    caj: &CarbonAwareJob,
    mut status: CarbonAwareJobStatus,
) -> Result<Action, ReconcileError> {
    let now = Utc::now();
    let scheduled = status.scheduled_time.as_ref().map(|t| t.0).unwrap_or(now);

    if now < scheduled {
        return Ok(requeue_at(&status, now));
    }

    // A previous reconcile may have created the job and crashed
    // before persisting jobName: adopt through the owner lookup
    // instead of creating a second child.
    if let Some(existing) = find_child_job(jobs, caj).await? {
        let job_name = existing.name_any();
        info!(name = %caj.name_any(), job = %job_name, "adopting existing child job");
        status.job_name = Some(job_name.clone());
        status.scheduling_state = Some(SchedulingState::Scheduled);
        push_condition(
            &mut status,
            CONDITION_STARTED,
            REASON_JOB_ADOPTED,
            format!("Adopted existing job: {job_name}"),
            now,
        );
        patch_status(api, &caj.name_any(), &status).await?;
        return Ok(Action::requeue(JOB_POLL_INTERVAL));
    }

    let job = construct_job(caj, &status);
    let job_name = job.name_any();
    match jobs.create(&PostParams::default(), &job).await {
        Ok(_) => info!(name = %caj.name_any(), job = %job_name, "created child job"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            info!(name = %caj.name_any(), job = %job_name, "child job already exists, adopting");
        }
        Err(e) => return Err(classify(e)),
    }

    status.job_name = Some(job_name.clone());
    status.scheduling_state = Some(SchedulingState::Scheduled);
    push_condition(
        &mut status,
        CONDITION_STARTED,
        REASON_JOB_CREATED,
        format!("Job created: {job_name}"),
        now,
    );
    patch_status(api, &caj.name_any(), &status).await?;
    Ok(Action::requeue(JOB_POLL_INTERVAL))
}

/// Scheduled/Running: track the child job to a terminal state.
async fn handle_scheduled(
    api: &Api<CarbonAwareJob>,
    jobs: &Api<Job>,
    caj: &CarbonAwareJob,
    mut status: CarbonAwareJobStatus,
) -> Result<Action, ReconcileError> {
    let now = Utc::now();

    let job = resolve_child_job(jobs, caj, status.job_name.as_deref()).await?;
    let Some(job) = job else {
        warn!(name = %caj.name_any(), "child job disappeared, marking failed");
        status.scheduling_state = Some(SchedulingState::Failed);
        status.job_status = None;
        patch_status(api, &caj.name_any(), &status).await?;
        return Ok(Action::await_change());
    };

    if status.job_name.is_none() {
        status.job_name = Some(job.name_any());
    }
    status.job_status = job.status.clone();

    match child_state(job.status.as_ref()) {
        Some(SchedulingState::Running) => {
            status.scheduling_state = Some(SchedulingState::Running);
        }
        Some(SchedulingState::Completed) => {
            status.scheduling_state = Some(SchedulingState::Completed);
            push_condition(
                &mut status,
                CONDITION_COMPLETED,
                REASON_JOB_SUCCEEDED,
                format!("Job {} completed successfully", job.name_any()),
                now,
            );
        }
        Some(SchedulingState::Failed) => {
            status.scheduling_state = Some(SchedulingState::Failed);
            push_condition(
                &mut status,
                CONDITION_FAILED,
                REASON_JOB_FAILED,
                format!("Job {} failed", job.name_any()),
                now,
            );
        }
        _ => {}
    }

    patch_status(api, &caj.name_any(), &status).await?;

    match status.scheduling_state {
        Some(SchedulingState::Completed) | Some(SchedulingState::Failed) => {
            Ok(Action::await_change())
        }
        _ => Ok(Action::requeue(JOB_POLL_INTERVAL)),
    }
}

/// Deletion: propagate to the child job, then release the finalizer.
async fn handle_deletion(
    api: &Api<CarbonAwareJob>,
    jobs: &Api<Job>,
    caj: &CarbonAwareJob,
) -> Result<Action, ReconcileError> {
    info!(name = %caj.name_any(), "handling deletion");

    let job_name = caj
        .status
        .as_ref()
        .and_then(|s| s.job_name.clone());
    if let Some(job) = resolve_child_job(jobs, caj, job_name.as_deref()).await? {
        let job_name = job.name_any();
        match jobs.delete(&job_name, &DeleteParams::background()).await {
            Ok(_) => info!(job = %job_name, "deleted child job"),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(e) => return Err(classify(e)),
        }
    }

    if caj.finalizers().iter().any(|f| f == FINALIZER) {
        remove_finalizer(api, caj).await?;
    }
    Ok(Action::await_change())
}

/// Record a successful planning decision.
fn apply_schedule_decision(
    status: &mut CarbonAwareJobStatus,
    response: &ScheduleResponse,
    now: DateTime<Utc>,
) {
    let optimal_time = Time(response.ideal.time);

    status.scheduling_decision = Some(SchedulingDecision {
        optimal_time: Some(optimal_time.clone()),
        worst_case_time: Some(Time(response.worst_case.time)),
        optimal_intensity: Some(format_intensity(response.ideal.co2_intensity)),
        worst_case_intensity: Some(format_intensity(response.worst_case.co2_intensity)),
        immediate_intensity: Some(format_intensity(response.naive_case.co2_intensity)),
        forecast_source: Some(FORECAST_SOURCE_API.to_string()),
        decision_reason: Some(format!(
            "Optimal time determined for {} based on carbon intensity forecast",
            response.ideal.zone
        )),
    });
    status.scheduled_time = Some(optimal_time);
    status.carbon_intensity = Some(format_intensity(response.ideal.co2_intensity));
    status.carbon_savings = Some(CarbonSavings {
        vs_worst_case: Some(format_savings(response.carbon_savings.vs_worst_case)),
        vs_naive_case: Some(format_savings(response.carbon_savings.vs_naive_case)),
        vs_median_case: Some(format_savings(response.carbon_savings.vs_median_case)),
    });
    status.scheduling_state = Some(SchedulingState::Pending);
    push_condition(
        status,
        CONDITION_SCHEDULED,
        REASON_FORECAST_EVALUATED,
        format!(
            "Scheduled for {} based on carbon forecast",
            response.ideal.time.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        now,
    );
}

/// Record the launch-now fallback when planning was impossible. The
/// user sees a clear "we could not plan, so we launched now" signal.
fn apply_fallback_decision(
    status: &mut CarbonAwareJobStatus,
    submission: DateTime<Utc>,
    reason: &str,
    now: DateTime<Utc>,
) {
    let immediate = Time(submission);

    status.scheduling_decision = Some(SchedulingDecision {
        optimal_time: Some(immediate.clone()),
        worst_case_time: Some(immediate.clone()),
        optimal_intensity: Some(UNKNOWN_INTENSITY.to_string()),
        worst_case_intensity: Some(UNKNOWN_INTENSITY.to_string()),
        immediate_intensity: Some(UNKNOWN_INTENSITY.to_string()),
        forecast_source: Some(FORECAST_SOURCE_FALLBACK.to_string()),
        decision_reason: Some(reason.to_string()),
    });
    status.scheduled_time = Some(immediate);
    status.carbon_intensity = Some(UNKNOWN_INTENSITY.to_string());
    status.carbon_savings = Some(CarbonSavings {
        vs_worst_case: Some(ZERO_SAVINGS.to_string()),
        vs_naive_case: Some(ZERO_SAVINGS.to_string()),
        vs_median_case: Some(ZERO_SAVINGS.to_string()),
    });
    status.scheduling_state = Some(SchedulingState::Pending);
    push_condition(
        status,
        CONDITION_SCHEDULED,
        REASON_FALLBACK_SCHEDULING,
        reason.to_string(),
        now,
    );
}

/// Build the child job: stable name, ownership back-reference, and
/// the carbon annotations observers read.
fn construct_job(caj: &CarbonAwareJob, status: &CarbonAwareJobStatus) -> Job {
    let submission_unix = status
        .submission_time
        .as_ref()
        .map(|t| t.0.timestamp())
        .unwrap_or(0);
    let job_name = format!("{}-{submission_unix}", caj.name_any());

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), APP_NAME.to_string());
    labels.insert(LABEL_INSTANCE.to_string(), caj.name_any());
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGER_NAME.to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(
        ANNOTATION_CARBON_INTENSITY.to_string(),
        status
            .carbon_intensity
            .clone()
            .unwrap_or_else(|| UNKNOWN_INTENSITY.to_string()),
    );
    annotations.insert(
        ANNOTATION_SCHEDULED_TIME.to_string(),
        status
            .scheduled_time
            .as_ref()
            .map(|t| t.0.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default(),
    );
    annotations.insert(
        ANNOTATION_SAVINGS_PCT.to_string(),
        status
            .carbon_savings
            .as_ref()
            .and_then(|s| s.vs_naive_case.clone())
            .unwrap_or_else(|| ZERO_SAVINGS.to_string()),
    );
    annotations.insert(ANNOTATION_PARENT_NAME.to_string(), caj.name_any());
    annotations.insert(
        ANNOTATION_PARENT_UID.to_string(),
        caj.uid().unwrap_or_default(),
    );

    // Template labels and annotations ride along.
    if let Some(metadata) = &caj.spec.job_template.metadata {
        if let Some(template_labels) = &metadata.labels {
            for (k, v) in template_labels {
                labels.insert(k.clone(), v.clone());
            }
        }
        if let Some(template_annotations) = &metadata.annotations {
            for (k, v) in template_annotations {
                annotations.insert(k.clone(), v.clone());
            }
        }
    }

    let owner = OwnerReference {
        api_version: CarbonAwareJob::api_version(&()).into_owned(),
        kind: CarbonAwareJob::kind(&()).into_owned(),
        name: caj.name_any(),
        uid: caj.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    Job {
        metadata: ObjectMeta {
            name: Some(job_name),
            namespace: caj.namespace(),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(caj.spec.job_template.spec.clone()),
        status: None,
    }
}

/// Classify a child job's status snapshot.
fn child_state(job_status: Option<&JobStatus>) -> Option<SchedulingState> {
    let status = job_status?;
    if status.active.unwrap_or(0) > 0 {
        Some(SchedulingState::Running)
    } else if status.succeeded.unwrap_or(0) > 0 {
        Some(SchedulingState::Completed)
    } else if status.failed.unwrap_or(0) > 0 {
        Some(SchedulingState::Failed)
    } else {
        None
    }
}

/// Whether `job` is controlled by the workload with `uid`.
fn is_child_of(job: &Job, uid: &str) -> bool {
    job.metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.uid == uid && r.controller == Some(true))
}

/// Reverse lookup of the owned child: label-scoped list filtered by
/// the controller owner reference UID.
async fn find_child_job(
    jobs: &Api<Job>,
    caj: &CarbonAwareJob,
) -> Result<Option<Job>, ReconcileError> {
    let selector = format!(
        "{LABEL_MANAGED_BY}={MANAGER_NAME},{LABEL_INSTANCE}={}",
        caj.name_any()
    );
    let list = jobs
        .list(&ListParams::default().labels(&selector))
        .await
        .map_err(classify)?;

    let uid = caj.uid().unwrap_or_default();
    Ok(list.items.into_iter().find(|job| is_child_of(job, &uid)))
}

/// Find the child by its recorded name, falling back to the owner
/// lookup when the name was never persisted.
async fn resolve_child_job(
    jobs: &Api<Job>,
    caj: &CarbonAwareJob,
    job_name: Option<&str>,
) -> Result<Option<Job>, ReconcileError> {
    if let Some(name) = job_name {
        if let Some(job) = jobs.get_opt(name).await.map_err(classify)? {
            return Ok(Some(job));
        }
    }
    find_child_job(jobs, caj).await
}

async fn patch_status(
    api: &Api<CarbonAwareJob>,
    name: &str,
    status: &CarbonAwareJobStatus,
) -> Result<(), ReconcileError> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(classify)?;
    Ok(())
}

async fn add_finalizer(
    api: &Api<CarbonAwareJob>,
    caj: &CarbonAwareJob,
) -> Result<(), ReconcileError> {
    let mut finalizers = caj.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    patch_finalizers(api, &caj.name_any(), finalizers).await
}

async fn remove_finalizer(
    api: &Api<CarbonAwareJob>,
    caj: &CarbonAwareJob,
) -> Result<(), ReconcileError> {
    let finalizers: Vec<String> = caj
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .cloned()
        .collect();
    patch_finalizers(api, &caj.name_any(), finalizers).await
}

async fn patch_finalizers(
    api: &Api<CarbonAwareJob>,
    name: &str,
    finalizers: Vec<String>,
) -> Result<(), ReconcileError> {
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(classify)?;
    Ok(())
}

fn push_condition(
    status: &mut CarbonAwareJobStatus,
    type_: &str,
    reason: &str,
    message: String,
    now: DateTime<Utc>,
) {
    status.conditions.push(Condition {
        last_transition_time: Time(now),
        message,
        observed_generation: None,
        reason: reason.to_string(),
        status: "True".to_string(),
        type_: type_.to_string(),
    });
}

/// Requeue at the scheduled time (immediately when it has passed).
fn requeue_at(status: &CarbonAwareJobStatus, now: DateTime<Utc>) -> Action {
    let scheduled = status.scheduled_time.as_ref().map(|t| t.0).unwrap_or(now);
    let delay = (scheduled - now).to_std().unwrap_or(StdDuration::ZERO);
    Action::requeue(delay)
}

fn format_intensity(value: f64) -> String {
    format!("{value:.2} gCO2eq/kWh")
}

fn format_savings(value: f64) -> String {
    format!("-{value:.2}%")
}

/// Parse the user's flex window; rejects negatives by construction
/// (the duration grammar has no sign).
fn parse_flex_window(input: &str) -> Result<Duration, String> {
    let std_duration = api_types::parse_duration(input).map_err(|e| e.to_string())?;
    Duration::from_std(std_duration).map_err(|e| e.to_string())
}

/// The expected task duration, defaulting to one hour.
fn job_duration_or_default(max_duration: Option<&str>) -> Duration {
    match max_duration {
        Some(input) => match parse_flex_window(input) {
            Ok(duration) if duration > Duration::zero() => duration,
            Ok(_) => Duration::hours(1),
            Err(reason) => {
                warn!("invalid maxDuration '{input}', defaulting to 1h: {reason}");
                Duration::hours(1)
            }
        },
        None => Duration::hours(1),
    }
}

/// Location for workloads that do not specify one: detect from node
/// labels, fall back to the historical default.
async fn default_location(client: &Client) -> String {
    match introspection::detect_cloud_environment(client.clone()).await {
        Ok(env) if !env.region.is_empty() && env.provider != "unknown" => {
            format!("{}:{}", env.provider, env.region)
        }
        Ok(env) => {
            warn!(
                provider = %env.provider,
                region = %env.region,
                "cluster environment incomplete, using default location"
            );
            DEFAULT_LOCATION.to_string()
        }
        Err(report) => {
            warn!("could not detect cluster environment, using default location: {report:?}");
            DEFAULT_LOCATION.to_string()
        }
    }
}
