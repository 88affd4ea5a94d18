use async_trait::async_trait;
use dbx_core::{FunctionCatalog, Probe, ToolError, WorkspaceApi};
use dbx_models::endpoints::{
    CURRENT_USER,
    JOBS_GET,
    JOBS_LIST,
    JOBS_RUNS_LIST,
    UC_FUNCTIONS,
    UC_TABLES,
};
use dbx_models::{
    CurrentUser,
    FunctionInfo,
    FunctionList,
    Job,
    JobList,
    JobRun,
    RunList,
    TableInfo,
    TableList,
};

use crate::client::DatabricksClient;

/// Largest page the jobs list endpoint accepts.
const JOBS_PAGE_SIZE: u32 = 100;
/// Largest page the runs list endpoint accepts.
const RUNS_PAGE_SIZE: u32 = 25;
/// Upper bound on pages followed for one listing call.
const MAX_PAGES: usize = 50;

#[async_trait]
impl Probe for DatabricksClient {
    async fn ping(&self) -> Result<(), ToolError> {
        self.current_user().await.map(|_| ())
    }
}

#[async_trait]
impl WorkspaceApi for DatabricksClient {
    async fn list_jobs(&self, limit: Option<u32>) -> Result<Vec<Job>, ToolError> {
        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page_size = page_size(limit, jobs.len(), JOBS_PAGE_SIZE);
            let mut query = vec![("limit", page_size.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let page: JobList = self.get(JOBS_LIST, &query).await?;
            jobs.extend(page.jobs);
            if reached(limit, jobs.len()) || !page.has_more {
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        truncate(&mut jobs, limit);
        Ok(jobs)
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, ToolError> {
        self.get(JOBS_GET, &[("job_id", job_id.to_string())]).await
    }

    async fn list_job_runs(
        &self,
        job_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<JobRun>, ToolError> {
        let mut runs = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page_size = page_size(limit, runs.len(), RUNS_PAGE_SIZE);
            let mut query = vec![
                ("job_id", job_id.to_string()),
                ("limit", page_size.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let page: RunList = self.get(JOBS_RUNS_LIST, &query).await?;
            runs.extend(page.runs);
            if reached(limit, runs.len()) || !page.has_more {
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        truncate(&mut runs, limit);
        Ok(runs)
    }

    async fn current_user(&self) -> Result<CurrentUser, ToolError> {
        self.get(CURRENT_USER, &[]).await
    }

    async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<TableInfo>, ToolError> {
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("catalog_name", catalog.to_string()),
                ("schema_name", schema.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let page: TableList = self.get(UC_TABLES, &query).await?;
            tables.extend(page.tables);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(tables)
    }
}

#[async_trait]
impl FunctionCatalog for DatabricksClient {
    async fn list_functions(
        &self,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<FunctionInfo>, ToolError> {
        let mut functions = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("catalog_name", catalog.to_string()),
                ("schema_name", schema.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let page: FunctionList = self.get(UC_FUNCTIONS, &query).await?;
            functions.extend(page.functions);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(functions)
    }

    async fn get_function(&self, full_name: &str) -> Result<FunctionInfo, ToolError> {
        self.get(&format!("{UC_FUNCTIONS}/{full_name}"), &[]).await
    }
}

fn page_size(limit: Option<u32>, collected: usize, max: u32) -> u32 {
    let Some(limit) = limit else {
        return max;
    };
    let collected = u32::try_from(collected).unwrap_or(u32::MAX);
    limit.saturating_sub(collected).clamp(1, max)
}

fn reached(limit: Option<u32>, collected: usize) -> bool {
    limit.is_some_and(|limit| collected >= limit as usize)
}

fn truncate<T>(items: &mut Vec<T>, limit: Option<u32>) {
    if let Some(limit) = limit {
        items.truncate(limit as usize);
    }
}
