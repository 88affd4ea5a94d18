use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbx_core::{
    Tool,
    ToolContext,
    ToolError,
    ToolResult,
    ToolSpec,
    ValidatedArguments,
    format_table,
};
use dbx_models::{Job, JobRun};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WorkspaceSource;

const MISSING: &str = "N/A";

/// Parameters for listing jobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListJobsParams {
    /// Maximum number of jobs to return.
    pub limit: Option<u32>,
}

/// Parameters for fetching one job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobIdParams {
    pub job_id: i64,
}

/// Parameters for listing the runs of a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetJobRunsParams {
    pub job_id: i64,
    /// Maximum number of runs to return, newest first.
    pub limit: Option<u32>,
}

/// Renders jobs as `Job ID | Job Name | Created By`.
#[must_use]
pub fn format_jobs(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }
    let rows: Vec<Vec<Value>> = jobs
        .iter()
        .map(|job| {
            vec![
                Value::from(job.job_id),
                Value::from(job.name().unwrap_or(MISSING)),
                Value::from(job.creator_user_name.as_deref().unwrap_or(MISSING)),
            ]
        })
        .collect();
    format_table(&["Job ID", "Job Name", "Created By"], &rows)
}

/// Renders runs as `Run ID | State | Start Time | End Time | Duration`.
#[must_use]
pub fn format_job_runs(job_id: i64, runs: &[JobRun]) -> String {
    if runs.is_empty() {
        return format!("No runs found for job ID {job_id}.");
    }
    let rows: Vec<Vec<Value>> = runs
        .iter()
        .map(|run| {
            vec![
                Value::from(run.run_id),
                Value::from(run_state(run)),
                Value::from(timestamp(run.start_time)),
                Value::from(timestamp(run.end_time)),
                Value::from(run_duration(run)),
            ]
        })
        .collect();
    format_table(
        &["Run ID", "State", "Start Time", "End Time", "Duration"],
        &rows,
    )
}

/// Renders a job summary followed by its task table.
#[must_use]
pub fn format_job_details(job: &Job) -> String {
    let name = job.name().unwrap_or(MISSING);
    let mut lines = vec![
        format!("## Job Details: {name}"),
        String::new(),
        format!("- **Job ID:** {}", job.job_id),
        format!("- **Created:** {}", timestamp(job.created_time)),
        format!(
            "- **Creator:** {}",
            job.creator_user_name.as_deref().unwrap_or(MISSING)
        ),
        String::new(),
    ];
    let tasks = job
        .settings
        .as_ref()
        .map(|settings| settings.tasks.as_slice())
        .unwrap_or_default();
    if tasks.is_empty() {
        lines.push("No tasks defined for this job.".to_string());
    } else {
        let rows: Vec<Vec<Value>> = tasks
            .iter()
            .map(|task| {
                vec![
                    Value::from(task.task_key.as_str()),
                    Value::from(task.kind().unwrap_or(MISSING)),
                    Value::from(task.description.as_deref().unwrap_or(MISSING)),
                ]
            })
            .collect();
        lines.push("### Tasks:".to_string());
        lines.push(String::new());
        lines.push(format_table(&["Task Key", "Task Type", "Description"], &rows));
    }
    lines.join("\n")
}

fn run_state(run: &JobRun) -> String {
    let state = run.state.as_ref();
    let life_cycle = state
        .and_then(|state| state.life_cycle_state.as_deref())
        .unwrap_or(MISSING);
    match state.and_then(|state| state.result_state.as_deref()) {
        Some(result) => format!("{life_cycle} ({result})"),
        None => life_cycle.to_string(),
    }
}

fn run_duration(run: &JobRun) -> String {
    let millis = match (run.execution_duration, run.start_time, run.end_time) {
        (Some(duration), _, _) if duration > 0 => duration,
        (_, Some(start), Some(end)) if start > 0 && end > 0 => end - start,
        _ => return MISSING.to_string(),
    };
    #[allow(clippy::cast_precision_loss)]
    let seconds = millis as f64 / 1000.0;
    format!("{seconds:.2}s")
}

/// Epoch milliseconds as a UTC `YYYY-MM-DD HH:MM:SS` string.
fn timestamp(millis: Option<i64>) -> String {
    millis
        .filter(|millis| *millis > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || MISSING.to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}

pub struct ListJobs {
    spec: ToolSpec,
    workspace: WorkspaceSource,
}

impl ListJobs {
    pub fn new(workspace: WorkspaceSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<ListJobsParams>(
                "list_jobs",
                "List jobs in the workspace as a Markdown table.",
            ),
            workspace,
        }
    }
}

#[async_trait]
impl Tool for ListJobs {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: ListJobsParams = args.parse()?;
        let workspace = self.workspace.acquire().await?;
        let jobs = workspace.list_jobs(params.limit).await?;
        Ok(ToolResult::text(format_jobs(&jobs)))
    }
}

pub struct GetJob {
    spec: ToolSpec,
    workspace: WorkspaceSource,
}

impl GetJob {
    pub fn new(workspace: WorkspaceSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<JobIdParams>(
                "get_job",
                "Get a job definition by ID as JSON.",
            ),
            workspace,
        }
    }
}

#[async_trait]
impl Tool for GetJob {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: JobIdParams = args.parse()?;
        let workspace = self.workspace.acquire().await?;
        let job = workspace.get_job(params.job_id).await?;
        ToolResult::json(&job)
    }
}

pub struct GetJobDetails {
    spec: ToolSpec,
    workspace: WorkspaceSource,
}

impl GetJobDetails {
    pub fn new(workspace: WorkspaceSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<JobIdParams>(
                "get_job_details",
                "Summarize a job: name, creator, creation time and its tasks.",
            ),
            workspace,
        }
    }
}

#[async_trait]
impl Tool for GetJobDetails {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: JobIdParams = args.parse()?;
        let workspace = self.workspace.acquire().await?;
        let job = workspace.get_job(params.job_id).await?;
        Ok(ToolResult::text(format_job_details(&job)))
    }
}

pub struct GetJobRuns {
    spec: ToolSpec,
    workspace: WorkspaceSource,
}

impl GetJobRuns {
    pub fn new(workspace: WorkspaceSource) -> Self {
        Self {
            spec: ToolSpec::for_params::<GetJobRunsParams>(
                "get_job_runs",
                "List recent runs of a job with state, timing and duration.",
            ),
            workspace,
        }
    }
}

#[async_trait]
impl Tool for GetJobRuns {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(
        &self,
        args: ValidatedArguments,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: GetJobRunsParams = args.parse()?;
        let workspace = self.workspace.acquire().await?;
        let runs = workspace.list_job_runs(params.job_id, params.limit).await?;
        Ok(ToolResult::text(format_job_runs(params.job_id, &runs)))
    }
}
