//! Todoist API client implementation
//!
//! Thin wrapper over the unified v1 REST API with a retry decorator
//! shared by every call.

use std::sync::Arc;

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TodoistError};
use crate::types::{
    CreateTaskArgs, LabelArgs, MoveTaskArgs, Page, TodoistLabel, TodoistProject, TodoistTask,
    UpdateTaskArgs,
};

/// Todoist API base URL
const API_BASE: &str = "https://api.todoist.com/api/v1";

/// Todoist API client
///
/// One method per remote operation; every call runs through the same
/// retry decorator (`execute_with_retry`):
///
/// - 429 and 5xx responses are retried up to the policy's attempt cap,
///   waiting for the `Retry-After` header when present and the policy's
///   base delay otherwise
/// - any other non-2xx response fails after a single attempt with the
///   status and message preserved
///
/// # Example
///
/// ```ignore
/// use provider_todoist::TodoistClient;
///
/// let client = TodoistClient::new(http_client, access_token);
/// let page = client.list_tasks(None).await?;
/// ```
pub struct TodoistClient {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// API access token
    access_token: String,

    /// Retry behavior for transient failures
    retry_policy: RetryPolicy,
}

impl TodoistClient {
    /// Create a new client with the default retry policy
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn url(path: &str) -> String {
        format!("{}{}", API_BASE, path)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, Self::url(path))
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
    }

    /// Map a non-success response to an error, keeping status and body
    fn api_error(response: &HttpResponse) -> TodoistError {
        let message = response
            .text()
            .unwrap_or_else(|_| "<non-utf8 body>".to_string());
        TodoistError::ApiError {
            status: response.status,
            message,
        }
    }

    /// Execute a request, retrying rate limits and server errors
    ///
    /// Waits for the response's `Retry-After` duration when present,
    /// otherwise the policy's base delay, capped by the policy's maximum.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 1u32;

        loop {
            let response = self.http_client.execute(request.clone()).await?;

            if response.is_success() {
                return Ok(response);
            }

            let retryable = response.status == 429 || response.is_server_error();
            if !retryable || attempt >= self.retry_policy.max_attempts {
                return Err(Self::api_error(&response));
            }

            let delay = response
                .retry_after()
                .unwrap_or(self.retry_policy.base_delay)
                .min(self.retry_policy.max_delay);
            warn!(
                "API request failed (attempt {}/{}): status={}, retrying in {:?}",
                attempt, self.retry_policy.max_attempts, response.status, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(HttpMethod::Get, path);
        let response = self.execute_with_retry(request).await?;
        response
            .json()
            .map_err(|e| TodoistError::ParseError(e.to_string()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.request(HttpMethod::Post, path).json(body)?;
        let response = self.execute_with_retry(request).await?;
        response
            .json()
            .map_err(|e| TodoistError::ParseError(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        let request = self.request(HttpMethod::Post, path);
        self.execute_with_retry(request).await?;
        Ok(())
    }

    fn paginated(path: &str, params: &[(&str, &str)], cursor: Option<&str>) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>();
        if let Some(cursor) = cursor {
            query.push(format!("cursor={}", urlencoding::encode(cursor)));
        }
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query.join("&"))
        }
    }

    // ====== Listing operations ======

    /// List one page of projects
    #[instrument(skip(self))]
    pub async fn list_projects(&self, cursor: Option<&str>) -> Result<Page<TodoistProject>> {
        self.get_json(&Self::paginated("/projects", &[], cursor)).await
    }

    /// List one page of labels
    #[instrument(skip(self))]
    pub async fn list_labels(&self, cursor: Option<&str>) -> Result<Page<TodoistLabel>> {
        self.get_json(&Self::paginated("/labels", &[], cursor)).await
    }

    /// List one page of active tasks
    #[instrument(skip(self))]
    pub async fn list_tasks(&self, cursor: Option<&str>) -> Result<Page<TodoistTask>> {
        self.get_json(&Self::paginated("/tasks", &[], cursor)).await
    }

    /// List one page of tasks completed since the given RFC 3339 timestamp
    #[instrument(skip(self))]
    pub async fn list_completed_tasks(
        &self,
        since: &str,
        cursor: Option<&str>,
    ) -> Result<Page<TodoistTask>> {
        self.get_json(&Self::paginated("/tasks/completed", &[("since", since)], cursor))
            .await
    }

    // ====== Task mutations ======

    /// Create a task, returning the created resource
    #[instrument(skip(self, args), fields(content = %args.content))]
    pub async fn create_task(&self, args: &CreateTaskArgs) -> Result<TodoistTask> {
        let task: TodoistTask = self.post_json("/tasks", args).await?;
        debug!(task_id = %task.id, "Created remote task");
        Ok(task)
    }

    /// Update a task's fields (moves go through [`Self::move_task`])
    #[instrument(skip(self, args), fields(task_id = %task_id))]
    pub async fn update_task(&self, task_id: &str, args: &UpdateTaskArgs) -> Result<TodoistTask> {
        self.post_json(&format!("/tasks/{}", urlencoding::encode(task_id)), args)
            .await
    }

    /// Move a task to another project or parent
    #[instrument(skip(self, args), fields(task_id = %task_id))]
    pub async fn move_task(&self, task_id: &str, args: &MoveTaskArgs) -> Result<()> {
        let request = self
            .request(
                HttpMethod::Post,
                &format!("/tasks/{}/move", urlencoding::encode(task_id)),
            )
            .json(args)?;
        self.execute_with_retry(request).await?;
        Ok(())
    }

    /// Mark a task complete
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn close_task(&self, task_id: &str) -> Result<()> {
        self.post_empty(&format!("/tasks/{}/close", urlencoding::encode(task_id)))
            .await
    }

    /// Reopen a completed task
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn reopen_task(&self, task_id: &str) -> Result<()> {
        self.post_empty(&format!("/tasks/{}/reopen", urlencoding::encode(task_id)))
            .await
    }

    /// Delete a task
    ///
    /// A 404 means the task is already gone and counts as success, so
    /// deletion propagation stays idempotent across interrupted passes.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        let request = self.request(
            HttpMethod::Delete,
            &format!("/tasks/{}", urlencoding::encode(task_id)),
        );
        match self.execute_with_retry(request).await {
            Ok(_) => Ok(()),
            Err(TodoistError::ApiError { status: 404, .. }) => {
                debug!(task_id = %task_id, "Task already deleted remotely");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ====== Label mutations ======

    /// Create a label
    #[instrument(skip(self, args), fields(name = %args.name))]
    pub async fn create_label(&self, args: &LabelArgs) -> Result<TodoistLabel> {
        self.post_json("/labels", args).await
    }

    /// Rename a label
    #[instrument(skip(self, args), fields(label_id = %label_id))]
    pub async fn update_label(&self, label_id: &str, args: &LabelArgs) -> Result<TodoistLabel> {
        self.post_json(&format!("/labels/{}", urlencoding::encode(label_id)), args)
            .await
    }
}
