//! Sync orchestration
//!
//! Drives one full synchronization pass per user as a sequential pipeline
//! of named steps behind a single error boundary. Every step is
//! idempotent against the entity mapping table, so an interrupted or
//! partially-failed pass is safe to re-run: committed steps stay
//! committed and are skipped next time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bridge_traits::crypto::TokenCipher;
use bridge_traits::http::{HttpClient, RetryPolicy};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use core_tasks::{
    Label, LabelRepository, ListRepository, SqliteLabelRepository, SqliteListRepository,
    SqliteTaskRepository, Task, TaskList, TaskRepository,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use provider_todoist::types::{LabelArgs, TodoistLabel, TodoistProject, TodoistTask};
use provider_todoist::TodoistClient;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::conflict::{ConflictDetector, ConflictRepository, SqliteConflictRepository};
use crate::error::{Result, SyncError};
use crate::integration::{IntegrationRepository, SqliteIntegrationRepository};
use crate::mapping::{EntityKind, EntityMapper, MappingState, SqliteEntityMapper};
use crate::state::{ProviderKind, SqliteSyncStateRepository, SyncState, SyncStateRepository, SyncStatus};
use crate::translate::{self, LocalTaskFields};

/// Sync pass configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum local lists created from remote projects on a first run
    pub bootstrap_list_cap: usize,

    /// Concurrent remote deletions during the deletion sweep
    pub delete_fan_out: usize,

    /// Retry behavior for remote calls
    pub retry_policy: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bootstrap_list_cap: 20,
            delete_fan_out: 4,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Counters describing what one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Local tasks created from remote tasks
    pub pulled: usize,
    /// Remote tasks created from local tasks
    pub pushed: usize,
    /// Remote tasks deleted during the sweep
    pub deleted_remote: usize,
    /// Mappings dropped because the remote side disappeared
    pub unlinked: usize,
    /// Local rows updated from remote changes
    pub updated_local: usize,
    /// Remote tasks updated from local changes
    pub updated_remote: usize,
    /// Conflicts still pending after the pass
    pub pending_conflicts: i64,
}

/// Remote entities fetched at the start of a pass
struct Snapshot {
    projects: Vec<TodoistProject>,
    labels: Vec<TodoistLabel>,
    tasks: Vec<TodoistTask>,
}

/// Drives synchronization passes
///
/// # Example
///
/// ```ignore
/// use core_sync::{SyncConfig, SyncOrchestrator};
///
/// let orchestrator = SyncOrchestrator::new(pool, http_client, cipher, SyncConfig::default());
/// let outcome = orchestrator.run_sync("user-1").await?;
/// println!("{} conflicts pending", outcome.pending_conflicts);
/// ```
pub struct SyncOrchestrator {
    http_client: Arc<dyn HttpClient>,
    cipher: Arc<dyn TokenCipher>,
    integrations: Arc<dyn IntegrationRepository>,
    sync_states: Arc<dyn SyncStateRepository>,
    mapper: Arc<dyn EntityMapper>,
    conflicts: Arc<dyn ConflictRepository>,
    detector: ConflictDetector,
    lists: Arc<dyn ListRepository>,
    labels: Arc<dyn LabelRepository>,
    tasks: Arc<dyn TaskRepository>,
    config: SyncConfig,

    /// Users with a pass currently running in this process
    active_syncs: Mutex<HashSet<String>>,
}

impl SyncOrchestrator {
    /// Create an orchestrator over a database pool, HTTP transport, and
    /// token cipher
    pub fn new(
        pool: SqlitePool,
        http_client: Arc<dyn HttpClient>,
        cipher: Arc<dyn TokenCipher>,
        config: SyncConfig,
    ) -> Self {
        let conflicts: Arc<dyn ConflictRepository> =
            Arc::new(SqliteConflictRepository::new(pool.clone()));

        Self {
            http_client,
            cipher,
            integrations: Arc::new(SqliteIntegrationRepository::new(pool.clone())),
            sync_states: Arc::new(SqliteSyncStateRepository::new(pool.clone())),
            mapper: Arc::new(SqliteEntityMapper::new(pool.clone())),
            detector: ConflictDetector::new(Arc::clone(&conflicts)),
            conflicts,
            lists: Arc::new(SqliteListRepository::new(pool.clone())),
            labels: Arc::new(SqliteLabelRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool)),
            config,
            active_syncs: Mutex::new(HashSet::new()),
        }
    }

    /// Run one synchronization pass for a user.
    ///
    /// Refuses to start while another pass is active for the same user,
    /// either in this process or per the persisted sync state. Any error
    /// after the pass has started leaves the state row at `error` with
    /// the message preserved; a completed pass leaves it at `idle` with a
    /// fresh `last_synced_at`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn run_sync(&self, user_id: &str) -> Result<SyncOutcome> {
        let provider = ProviderKind::Todoist;

        {
            let mut active = self.active_syncs.lock().await;
            if active.contains(user_id) {
                return Err(SyncError::SyncInProgress {
                    user_id: user_id.to_string(),
                });
            }
            if let Some(state) = self.sync_states.find(user_id, provider).await? {
                if !state.status.can_transition_to(SyncStatus::Syncing) {
                    return Err(SyncError::SyncInProgress {
                        user_id: user_id.to_string(),
                    });
                }
            }
            active.insert(user_id.to_string());
        }

        let result = self.run_pass(user_id, provider).await;

        self.active_syncs.lock().await.remove(user_id);
        result
    }

    async fn run_pass(&self, user_id: &str, provider: ProviderKind) -> Result<SyncOutcome> {
        // Step 1: missing integration is a configuration error and fails
        // fast without touching sync state
        let integration = self
            .integrations
            .find(user_id, provider)
            .await?
            .ok_or_else(|| SyncError::NoIntegration {
                user_id: user_id.to_string(),
                provider: provider.to_string(),
            })?;
        let token = integration.access_token(self.cipher.as_ref()).await?;
        let client = TodoistClient::new(Arc::clone(&self.http_client), token)
            .with_retry_policy(self.config.retry_policy.clone());

        let last_synced_at = self
            .sync_states
            .find(user_id, provider)
            .await?
            .and_then(|s| s.last_synced_at);

        // Step 2
        self.sync_states
            .upsert(&SyncState {
                user_id: user_id.to_string(),
                provider,
                status: SyncStatus::Syncing,
                last_synced_at,
                error_message: None,
            })
            .await?;

        // Steps 3-10 behind the error boundary
        match self
            .execute_pass(user_id, provider, &client, last_synced_at)
            .await
        {
            Ok(outcome) => {
                // Step 11
                self.sync_states
                    .upsert(&SyncState {
                        user_id: user_id.to_string(),
                        provider,
                        status: SyncStatus::Idle,
                        last_synced_at: Some(Utc::now().timestamp()),
                        error_message: None,
                    })
                    .await?;
                info!(
                    pulled = outcome.pulled,
                    pushed = outcome.pushed,
                    pending_conflicts = outcome.pending_conflicts,
                    "Sync pass completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                let terminal = SyncState {
                    user_id: user_id.to_string(),
                    provider,
                    status: SyncStatus::Error,
                    last_synced_at,
                    error_message: Some(e.to_string()),
                };
                if let Err(write_err) = self.sync_states.upsert(&terminal).await {
                    warn!(error = %write_err, "Failed to record sync error state");
                }
                Err(e)
            }
        }
    }

    async fn execute_pass(
        &self,
        user_id: &str,
        provider: ProviderKind,
        client: &TodoistClient,
        last_synced_at: Option<i64>,
    ) -> Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();

        // Step 3: remote snapshot
        let snapshot = self.fetch_snapshot(client, last_synced_at).await?;
        debug!(
            projects = snapshot.projects.len(),
            labels = snapshot.labels.len(),
            tasks = snapshot.tasks.len(),
            "Fetched remote snapshot"
        );

        // Step 4: project/list and label/list assignments
        let mut state = MappingState::new();
        self.bootstrap_assignments(user_id, provider, &snapshot, &mut state)
            .await?;

        // Step 5: labels
        self.reconcile_labels(user_id, provider, &snapshot, &mut state)
            .await?;

        // Mappings and rows as they stood before this pass creates more
        let task_mappings = self.mapper.list(user_id, provider, EntityKind::Task).await?;
        let local_tasks = self.tasks.find_by_user(user_id).await?;
        let local_by_id: HashMap<&str, &Task> =
            local_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let remote_by_id: HashMap<&str, &TodoistTask> =
            snapshot.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        // Step 6: conflict detection over pairs mapped on both sides
        let mut conflicted_local = HashSet::new();
        for mapping in &task_mappings {
            let (Some(task), Some(remote)) = (
                local_by_id.get(mapping.local_id.as_str()),
                remote_by_id.get(mapping.external_id.as_str()),
            ) else {
                continue;
            };

            let names = self.external_label_names(task, &state).await?;
            if self
                .detector
                .detect(user_id, provider, task, &names, remote, &state)
                .await?
            {
                conflicted_local.insert(mapping.local_id.clone());
            }
        }

        // Step 7: pull unmapped remote tasks, roots before children
        let mapped_external: HashSet<&str> = task_mappings
            .iter()
            .map(|m| m.external_id.as_str())
            .collect();
        let mut pulled: HashMap<String, String> = HashMap::new();
        for root_phase in [true, false] {
            for remote in &snapshot.tasks {
                if mapped_external.contains(remote.id.as_str())
                    || pulled.contains_key(&remote.id)
                    || remote.parent_id.is_none() != root_phase
                {
                    continue;
                }
                if let Some(local_id) = self
                    .pull_remote_task(user_id, provider, remote, &state, &pulled)
                    .await?
                {
                    pulled.insert(remote.id.clone(), local_id);
                    outcome.pulled += 1;
                }
            }
        }

        // Step 8: push unmapped, incomplete local tasks, roots before children
        let mapped_local: HashSet<&str> =
            task_mappings.iter().map(|m| m.local_id.as_str()).collect();
        let mut pushed: HashMap<String, String> = HashMap::new();
        for root_phase in [true, false] {
            for task in &local_tasks {
                if task.completed
                    || mapped_local.contains(task.id.as_str())
                    || conflicted_local.contains(&task.id)
                    || pushed.contains_key(&task.id)
                    || task.parent_id.is_none() != root_phase
                {
                    continue;
                }
                let external_id = self
                    .push_local_task(user_id, provider, client, task, &mut state, &pushed)
                    .await?;
                pushed.insert(task.id.clone(), external_id);
                outcome.pushed += 1;
            }
        }

        // Step 9: deletion sweep over pre-existing mappings. A pair with a
        // pending conflict keeps both sides and its mapping until the
        // conflict is resolved, even when one side has since disappeared.
        let pending_conflicts = self.conflicts.list_pending(user_id, provider).await?;
        let pending_pairs: HashSet<(&str, &str)> = pending_conflicts
            .iter()
            .map(|c| (c.local_id.as_str(), c.external_id.as_str()))
            .collect();
        let mut remote_deletes = Vec::new();
        for mapping in &task_mappings {
            if pending_pairs.contains(&(mapping.local_id.as_str(), mapping.external_id.as_str())) {
                continue;
            }
            let local_exists = local_by_id.contains_key(mapping.local_id.as_str());
            let remote_exists = remote_by_id.contains_key(mapping.external_id.as_str());

            if !local_exists {
                remote_deletes.push(mapping.external_id.clone());
            } else if !remote_exists {
                self.mapper
                    .unlink(user_id, provider, EntityKind::Task, &mapping.external_id)
                    .await?;
                outcome.unlinked += 1;
            }
        }
        let deleted: Vec<String> = stream::iter(remote_deletes.into_iter().map(|external_id| {
            async move {
                client.delete_task(&external_id).await?;
                Ok::<_, SyncError>(external_id)
            }
        }))
        .buffer_unordered(self.config.delete_fan_out.max(1))
        .try_collect()
        .await?;
        for external_id in deleted {
            self.mapper
                .unlink(user_id, provider, EntityKind::Task, &external_id)
                .await?;
            outcome.deleted_remote += 1;
        }

        // Step 10: bidirectional update propagation for surviving,
        // non-conflicted pairs
        for mapping in &task_mappings {
            if conflicted_local.contains(&mapping.local_id) {
                continue;
            }
            let (Some(task), Some(remote)) = (
                local_by_id.get(mapping.local_id.as_str()),
                remote_by_id.get(mapping.external_id.as_str()),
            ) else {
                continue;
            };

            let local_changed = last_synced_at.is_some_and(|ts| task.updated_at > ts);
            if local_changed {
                let label_ids = self.tasks.labels_for(&task.id).await?;
                self.ensure_remote_labels(user_id, provider, client, &label_ids, &mut state)
                    .await?;
                let args = translate::task_to_remote_update(task, &label_ids, &state);
                client.update_task(&mapping.external_id, &args).await?;
                if task.completed != remote.is_completed {
                    if task.completed {
                        client.close_task(&mapping.external_id).await?;
                    } else {
                        client.reopen_task(&mapping.external_id).await?;
                    }
                }
                outcome.updated_remote += 1;
            } else {
                let fields = translate::task_to_local(remote, &state);
                if self.apply_local_fields(task, &fields).await? {
                    outcome.updated_local += 1;
                }
            }
        }

        outcome.pending_conflicts = self.conflicts.count_pending(user_id, provider).await?;
        Ok(outcome)
    }

    // ====== Step 3: snapshot ======

    async fn fetch_snapshot(
        &self,
        client: &TodoistClient,
        last_synced_at: Option<i64>,
    ) -> Result<Snapshot> {
        let (projects, labels, mut tasks) = tokio::try_join!(
            Self::fetch_all_projects(client),
            Self::fetch_all_labels(client),
            Self::fetch_all_tasks(client),
        )?;

        // Completed tasks since the last pass, merged in without duplicates
        if let Some(since) = last_synced_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        {
            let seen: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
            let mut cursor: Option<String> = None;
            loop {
                let page = client
                    .list_completed_tasks(&since, cursor.as_deref())
                    .await?;
                for task in page.results {
                    if !seen.contains(&task.id) {
                        tasks.push(task);
                    }
                }
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        Ok(Snapshot {
            projects,
            labels,
            tasks,
        })
    }

    async fn fetch_all_projects(client: &TodoistClient) -> Result<Vec<TodoistProject>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = client.list_projects(cursor.as_deref()).await?;
            all.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }

    async fn fetch_all_labels(client: &TodoistClient) -> Result<Vec<TodoistLabel>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = client.list_labels(cursor.as_deref()).await?;
            all.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }

    async fn fetch_all_tasks(client: &TodoistClient) -> Result<Vec<TodoistTask>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = client.list_tasks(cursor.as_deref()).await?;
            all.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }

    // ====== Step 4: assignments ======

    async fn bootstrap_assignments(
        &self,
        user_id: &str,
        provider: ProviderKind,
        snapshot: &Snapshot,
        state: &mut MappingState,
    ) -> Result<()> {
        // Reuse persisted assignments first
        for mapping in self.mapper.list(user_id, provider, EntityKind::List).await? {
            state.assign_project(&mapping.external_id, &mapping.local_id);
        }
        let label_names: HashMap<&str, &str> = snapshot
            .labels
            .iter()
            .map(|l| (l.id.as_str(), l.name.as_str()))
            .collect();
        for mapping in self
            .mapper
            .list(user_id, provider, EntityKind::ListLabel)
            .await?
        {
            if let Some(name) = label_names.get(mapping.external_id.as_str()) {
                state.assign_label_list(&mapping.external_id, *name, &mapping.local_id);
            }
        }

        // First run creates local lists from remote projects, up to a cap
        let mut created = 0usize;
        for project in &snapshot.projects {
            if state.list_for_project(&project.id).is_some() {
                continue;
            }

            let list = match self.lists.find_by_name_ci(user_id, &project.name).await? {
                Some(existing) => {
                    if state.project_for_list(&existing.id).is_some() {
                        // Name collision with an already-assigned list
                        continue;
                    }
                    existing
                }
                None => {
                    if created >= self.config.bootstrap_list_cap {
                        warn!(
                            project = %project.name,
                            cap = self.config.bootstrap_list_cap,
                            "List bootstrap cap reached, skipping project"
                        );
                        continue;
                    }
                    let list = TaskList::new(user_id, &project.name);
                    self.lists.insert(&list).await?;
                    created += 1;
                    list
                }
            };

            self.mapper
                .link(user_id, provider, EntityKind::List, &project.id, &list.id, None)
                .await?;
            state.assign_project(&project.id, &list.id);
        }

        // A remote label whose name matches a local list not covered by
        // any project becomes a label-as-list assignment. Labels already
        // mapped as ordinary labels keep their meaning.
        let ordinary_labels: HashSet<String> = self
            .mapper
            .list(user_id, provider, EntityKind::Label)
            .await?
            .into_iter()
            .map(|m| m.external_id)
            .collect();
        for label in &snapshot.labels {
            if state.list_for_label(&label.id).is_some()
                || ordinary_labels.contains(&label.id)
            {
                continue;
            }
            let Some(list) = self.lists.find_by_name_ci(user_id, &label.name).await? else {
                continue;
            };
            if state.project_for_list(&list.id).is_some()
                || state.label_name_for_list(&list.id).is_some()
            {
                continue;
            }

            self.mapper
                .link(
                    user_id,
                    provider,
                    EntityKind::ListLabel,
                    &label.id,
                    &list.id,
                    None,
                )
                .await?;
            state.assign_label_list(&label.id, &label.name, &list.id);
        }

        Ok(())
    }

    // ====== Step 5: labels ======

    async fn reconcile_labels(
        &self,
        user_id: &str,
        provider: ProviderKind,
        snapshot: &Snapshot,
        state: &mut MappingState,
    ) -> Result<()> {
        let label_names: HashMap<&str, &str> = snapshot
            .labels
            .iter()
            .map(|l| (l.id.as_str(), l.name.as_str()))
            .collect();

        let label_mappings = self.mapper.list(user_id, provider, EntityKind::Label).await?;
        let mut mapped_external: HashSet<&str> = HashSet::new();
        for mapping in &label_mappings {
            mapped_external.insert(mapping.external_id.as_str());
            if let Some(name) = label_names.get(mapping.external_id.as_str()) {
                state.assign_label(&mapping.local_id, *name);
            } else if let Some(label) = self.labels.find_by_id(&mapping.local_id).await? {
                // Remote label gone from the snapshot; local name still
                // resolves payload emission
                state.assign_label(&mapping.local_id, &label.name);
            }
        }

        // Create local labels for unmapped remote labels
        for remote_label in &snapshot.labels {
            if mapped_external.contains(remote_label.id.as_str())
                || state.list_for_label(&remote_label.id).is_some()
            {
                continue;
            }

            let label = match self
                .labels
                .find_by_name_ci(user_id, &remote_label.name)
                .await?
            {
                Some(existing) => existing,
                None => {
                    let label = Label::new(user_id, &remote_label.name);
                    self.labels.insert(&label).await?;
                    debug!(name = %label.name, "Created local label");
                    label
                }
            };

            self.mapper
                .link(
                    user_id,
                    provider,
                    EntityKind::Label,
                    &remote_label.id,
                    &label.id,
                    None,
                )
                .await?;
            state.assign_label(&label.id, &remote_label.name);
        }

        Ok(())
    }

    // ====== Step 7: pull ======

    async fn pull_remote_task(
        &self,
        user_id: &str,
        provider: ProviderKind,
        remote: &TodoistTask,
        state: &MappingState,
        pulled: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        let fields = translate::task_to_local(remote, state);
        let Some(list_id) = fields.list_id.clone() else {
            warn!(
                external_id = %remote.id,
                "Remote task has no mapped list, skipping"
            );
            return Ok(None);
        };

        let mut task = Task::new(user_id, list_id, &fields.title);
        task.description = fields.description.clone();
        task.priority = fields.priority;
        task.due_at = fields.due_at;
        task.due_precision = fields.due_precision;
        task.recurrence = fields.recurrence.clone();
        if fields.completed {
            task.completed = true;
            task.completed_at = Some(
                remote
                    .completed_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.timestamp())
                    .unwrap_or_else(|| Utc::now().timestamp()),
            );
        }
        if let Some(parent_external) = &remote.parent_id {
            task.parent_id = match pulled.get(parent_external) {
                Some(local) => Some(local.clone()),
                None => {
                    self.mapper
                        .find_local(user_id, provider, EntityKind::Task, parent_external)
                        .await?
                }
            };
        }

        self.tasks.insert(&task).await?;
        if !fields.label_ids.is_empty() {
            self.tasks.set_labels(&task.id, &fields.label_ids).await?;
        }
        self.mapper
            .link(
                user_id,
                provider,
                EntityKind::Task,
                &remote.id,
                &task.id,
                remote.parent_id.as_deref(),
            )
            .await?;

        debug!(external_id = %remote.id, local_id = %task.id, "Pulled remote task");
        Ok(Some(task.id))
    }

    // ====== Step 8: push ======

    async fn push_local_task(
        &self,
        user_id: &str,
        provider: ProviderKind,
        client: &TodoistClient,
        task: &Task,
        state: &mut MappingState,
        pushed: &HashMap<String, String>,
    ) -> Result<String> {
        let label_ids = self.tasks.labels_for(&task.id).await?;
        self.ensure_remote_labels(user_id, provider, client, &label_ids, state)
            .await?;

        let mut args = translate::task_to_remote(task, &label_ids, state);
        if let Some(parent_local) = &task.parent_id {
            args.parent_id = match pushed.get(parent_local) {
                Some(external) => Some(external.clone()),
                None => {
                    self.mapper
                        .find_external(user_id, provider, EntityKind::Task, parent_local)
                        .await?
                }
            };
        }

        let created = client.create_task(&args).await?;
        self.mapper
            .link(
                user_id,
                provider,
                EntityKind::Task,
                &created.id,
                &task.id,
                args.parent_id.as_deref(),
            )
            .await?;

        debug!(local_id = %task.id, external_id = %created.id, "Pushed local task");
        Ok(created.id)
    }

    /// Create remote labels for any local label ids without an external
    /// name yet, linking them as they appear
    async fn ensure_remote_labels(
        &self,
        user_id: &str,
        provider: ProviderKind,
        client: &TodoistClient,
        label_ids: &[String],
        state: &mut MappingState,
    ) -> Result<()> {
        for label_id in label_ids {
            if state.external_label_name(label_id).is_some() {
                continue;
            }
            let Some(label) = self.labels.find_by_id(label_id).await? else {
                continue;
            };
            let created = client
                .create_label(&LabelArgs {
                    name: label.name.clone(),
                })
                .await?;
            self.mapper
                .link(user_id, provider, EntityKind::Label, &created.id, &label.id, None)
                .await?;
            state.assign_label(&label.id, &created.name);
        }
        Ok(())
    }

    // ====== Step 10 helpers ======

    /// Resolve a task's local label ids to external names for comparison
    async fn external_label_names(&self, task: &Task, state: &MappingState) -> Result<Vec<String>> {
        let ids = self.tasks.labels_for(&task.id).await?;
        Ok(ids
            .iter()
            .filter_map(|id| state.external_label_name(id))
            .map(str::to_string)
            .collect())
    }

    /// Apply remote-derived fields to a local row, returning whether
    /// anything changed
    async fn apply_local_fields(&self, task: &Task, fields: &LocalTaskFields) -> Result<bool> {
        let mut updated = task.clone();
        if let Some(list_id) = &fields.list_id {
            updated.list_id = list_id.clone();
        }
        updated.title = fields.title.clone();
        updated.description = fields.description.clone();
        updated.priority = fields.priority;
        updated.due_at = fields.due_at;
        updated.due_precision = fields.due_precision;
        updated.recurrence = fields.recurrence.clone();
        if fields.completed && !updated.completed {
            updated.completed = true;
            updated.completed_at = Some(Utc::now().timestamp());
        } else if !fields.completed && updated.completed {
            updated.completed = false;
            updated.completed_at = None;
        }

        let current_labels = {
            let mut ids = self.tasks.labels_for(&task.id).await?;
            ids.sort();
            ids
        };
        let wanted_labels = {
            let mut ids = fields.label_ids.clone();
            ids.sort();
            ids
        };

        if updated == *task && current_labels == wanted_labels {
            return Ok(false);
        }

        updated.updated_at = Utc::now().timestamp();
        self.tasks.update(&updated).await?;
        if current_labels != wanted_labels {
            self.tasks.set_labels(&task.id, &fields.label_ids).await?;
        }

        debug!(task_id = %task.id, "Applied remote changes to local task");
        Ok(true)
    }
}
