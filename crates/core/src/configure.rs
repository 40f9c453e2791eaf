use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};

use crate::{
    merge::{WebhookMerge, merge_failure_webhook},
    models::{JobAccessControlRequest, JobId, JobSettings, VIEWER_PERMISSION, Webhook},
    report::{JobOutcome, RunReport, StepOutcome},
    workspace::Workspace,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureRequest {
    /// ID of the notification destination pointing at the Monte Carlo webhook endpoint.
    pub notification_id: String,
    /// Application ID of the service principal to grant Can View to, if any.
    pub service_principal: Option<String>,
    /// Only jobs with these names are processed. Empty means all jobs.
    pub job_names: HashSet<String>,
}

/// Attach the failure webhook (and optionally the Can View grant) to every
/// selected job, recording one outcome per job into `report`.
///
/// Lookup failures abort before any job is modified. Failed updates are
/// recorded and processing continues.
pub async fn configure_jobs<W: Workspace>(
    workspace: &W,
    request: &ConfigureRequest,
    report: &mut RunReport,
) -> Result<()> {
    let webhook = resolve_notification(workspace, &request.notification_id).await?;
    let principal = match &request.service_principal {
        Some(application_id) => Some(resolve_service_principal(workspace, application_id).await?),
        None => None,
    };

    let jobs = workspace.list_jobs().await.context("Failed to list jobs")?;
    tracing::info!("Found {} jobs", jobs.len());
    report.set_total_jobs(jobs.len());

    if !request.job_names.is_empty() {
        let mut matches = HashMap::<&str, usize>::new();
        for name in jobs.iter().filter_map(|j| j.name()) {
            *matches.entry(name).or_default() += 1;
        }
        for name in &request.job_names {
            match matches.get(name.as_str()).copied().unwrap_or(0) {
                0 => tracing::debug!("No job named {}", name),
                1 => {}
                n => tracing::warn!("{} jobs are named {}, configuring all of them", n, name),
            }
        }
    }

    for job in &jobs {
        let settings = job
            .settings
            .as_ref()
            .with_context(|| format!("Job {} has no settings", job.job_id))?;
        // Match on the real name only; unnamed jobs never match a filter
        if !request.job_names.is_empty()
            && !settings.name.as_ref().is_some_and(|n| request.job_names.contains(n))
        {
            continue;
        }
        let job_name = match &settings.name {
            Some(name) => name.clone(),
            None => format!("job {}", job.job_id),
        };
        tracing::debug!("Configuring {} ({})", job_name, job.job_id);

        let webhook_outcome =
            add_webhook_to_job(workspace, job.job_id, &job_name, settings, &webhook).await;
        let permission_outcome = match &principal {
            Some(application_id) => {
                Some(add_can_view_permission(workspace, job.job_id, &job_name, application_id).await)
            }
            None => None,
        };
        report.record(JobOutcome {
            job_id: job.job_id,
            job_name,
            webhook: webhook_outcome,
            permission: permission_outcome,
        });
    }

    tracing::info!("Finished: {}", report.summary());
    Ok(())
}

async fn resolve_notification<W: Workspace>(workspace: &W, id: &str) -> Result<Webhook> {
    let destination = workspace
        .get_notification_destination(id)
        .await
        .with_context(|| format!("Failed to fetch notification destination {id}"))?;
    tracing::info!(
        "Using notification destination {} ({})",
        destination.display_name.as_deref().unwrap_or("[unnamed]"),
        destination.id
    );
    Ok(Webhook::new(id))
}

/// Returns the application ID of the first principal matching `application_id`.
async fn resolve_service_principal<W: Workspace>(
    workspace: &W,
    application_id: &str,
) -> Result<String> {
    let principals =
        workspace.list_service_principals().await.context("Failed to list service principals")?;
    let Some(principal) =
        principals.into_iter().find(|sp| sp.application_id.as_deref() == Some(application_id))
    else {
        bail!("Service principal with application ID {application_id} not found");
    };
    tracing::info!(
        "Using service principal {} ({})",
        principal.display_name.as_deref().unwrap_or("[unnamed]"),
        application_id
    );
    Ok(application_id.to_string())
}

async fn add_webhook_to_job<W: Workspace>(
    workspace: &W,
    job_id: JobId,
    job_name: &str,
    settings: &JobSettings,
    webhook: &Webhook,
) -> StepOutcome {
    let new_settings = match merge_failure_webhook(settings, webhook) {
        WebhookMerge::AlreadyConfigured => return StepOutcome::AlreadyConfigured,
        WebhookMerge::Updated(new_settings) => new_settings,
    };
    match workspace.update_job(job_id, &new_settings).await {
        Ok(()) => StepOutcome::Configured,
        Err(e) => {
            tracing::warn!("Failed to update settings for {} ({}): {:?}", job_name, job_id, e);
            StepOutcome::Failed(format!("{e:#}"))
        }
    }
}

async fn add_can_view_permission<W: Workspace>(
    workspace: &W,
    job_id: JobId,
    job_name: &str,
    application_id: &str,
) -> StepOutcome {
    let acl = [JobAccessControlRequest::service_principal(application_id, VIEWER_PERMISSION)];
    match workspace.update_job_permissions(job_id, &acl).await {
        Ok(()) => StepOutcome::Configured,
        Err(e) => {
            tracing::warn!("Failed to update permissions for {} ({}): {:?}", job_name, job_id, e);
            StepOutcome::Failed(format!("{e:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use serde_json::json;

    use super::*;
    use crate::models::{Job, NotificationDestination, ServicePrincipal};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        UpdateJob(JobId),
        UpdatePermissions(JobId),
    }

    #[derive(Default)]
    struct FakeWorkspace {
        destinations: Vec<NotificationDestination>,
        principals: Vec<ServicePrincipal>,
        jobs: Mutex<Vec<Job>>,
        acls: Mutex<HashMap<JobId, Vec<JobAccessControlRequest>>>,
        failing_updates: HashSet<JobId>,
        failing_permissions: HashSet<JobId>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeWorkspace {
        fn new(jobs: serde_json::Value) -> Self {
            Self {
                destinations: vec![NotificationDestination {
                    id: "N1".to_string(),
                    display_name: Some("Monte Carlo".to_string()),
                    destination_type: Some("WEBHOOK".to_string()),
                }],
                principals: vec![
                    ServicePrincipal {
                        application_id: Some("P0".to_string()),
                        ..Default::default()
                    },
                    ServicePrincipal {
                        id: Some("42".to_string()),
                        application_id: Some("P1".to_string()),
                        display_name: Some("monte-carlo".to_string()),
                        active: Some(true),
                    },
                ],
                jobs: Mutex::new(serde_json::from_value(jobs).unwrap()),
                ..Default::default()
            }
        }

        fn on_failure(&self, job_id: JobId) -> Option<Vec<String>> {
            let jobs = self.jobs.lock().unwrap();
            let job = jobs.iter().find(|j| j.job_id == job_id).unwrap();
            let webhooks = job.settings.as_ref()?.webhook_notifications.as_ref()?;
            Some(webhooks.on_failure.as_ref()?.iter().map(|w| w.id.clone()).collect())
        }

        fn acl(&self, job_id: JobId) -> Vec<JobAccessControlRequest> {
            self.acls.lock().unwrap().get(&job_id).cloned().unwrap_or_default()
        }

        fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }
    }

    impl Workspace for FakeWorkspace {
        async fn get_notification_destination(&self, id: &str) -> Result<NotificationDestination> {
            self.destinations
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(|| anyhow!("RESOURCE_DOES_NOT_EXIST: Notification destination {id}"))
        }

        async fn list_jobs(&self) -> Result<Vec<Job>> { Ok(self.jobs.lock().unwrap().clone()) }

        async fn update_job(&self, job_id: JobId, new_settings: &JobSettings) -> Result<()> {
            self.calls.lock().unwrap().push(Call::UpdateJob(job_id));
            if self.failing_updates.contains(&job_id) {
                bail!("PERMISSION_DENIED: cannot update job {job_id}");
            }
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.iter_mut().find(|j| j.job_id == job_id).context("no such job")?;
            job.settings = Some(new_settings.clone());
            Ok(())
        }

        async fn list_service_principals(&self) -> Result<Vec<ServicePrincipal>> {
            Ok(self.principals.clone())
        }

        async fn update_job_permissions(
            &self,
            job_id: JobId,
            access_control_list: &[JobAccessControlRequest],
        ) -> Result<()> {
            self.calls.lock().unwrap().push(Call::UpdatePermissions(job_id));
            if self.failing_permissions.contains(&job_id) {
                bail!("PERMISSION_DENIED: cannot change permissions on job {job_id}");
            }
            self.acls
                .lock()
                .unwrap()
                .entry(job_id)
                .or_default()
                .extend(access_control_list.iter().cloned());
            Ok(())
        }
    }

    fn request(job_names: &[&str]) -> ConfigureRequest {
        ConfigureRequest {
            notification_id: "N1".to_string(),
            service_principal: None,
            job_names: job_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn two_jobs() -> serde_json::Value {
        json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2, "settings": { "name": "B", "webhook_notifications": { "on_failure": [{ "id": "N1" }] } } }
        ])
    }

    #[tokio::test]
    async fn test_configures_new_and_skips_existing() {
        let workspace = FakeWorkspace::new(two_jobs());
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request(&[]), &mut report).await.unwrap();

        assert_eq!(workspace.on_failure(1), Some(vec!["N1".to_string()]));
        assert_eq!(workspace.on_failure(2), Some(vec!["N1".to_string()]));
        assert_eq!(workspace.calls(), vec![Call::UpdateJob(1)]);
        assert_eq!(report.total_jobs, Some(2));
        assert_eq!(report.outcomes, vec![
            JobOutcome {
                job_id: 1,
                job_name: "A".to_string(),
                webhook: StepOutcome::Configured,
                permission: None,
            },
            JobOutcome {
                job_id: 2,
                job_name: "B".to_string(),
                webhook: StepOutcome::AlreadyConfigured,
                permission: None,
            },
        ]);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let workspace = FakeWorkspace::new(json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2, "settings": { "name": "C", "webhook_notifications": { "on_failure": [{ "id": "X" }] } } }
        ]));
        configure_jobs(&workspace, &request(&[]), &mut RunReport::default()).await.unwrap();
        let calls_after_first = workspace.calls().len();

        let mut report = RunReport::default();
        configure_jobs(&workspace, &request(&[]), &mut report).await.unwrap();
        assert_eq!(workspace.calls().len(), calls_after_first);
        assert!(report.outcomes.iter().all(|o| o.webhook == StepOutcome::AlreadyConfigured));
        assert_eq!(workspace.on_failure(2), Some(vec!["X".to_string(), "N1".to_string()]));
    }

    #[tokio::test]
    async fn test_filter_leaves_other_jobs_untouched() {
        let workspace = FakeWorkspace::new(json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2, "settings": { "name": "B" } },
            { "job_id": 3, "settings": { "name": "C" } }
        ]));
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request(&["B", "missing"]), &mut report).await.unwrap();

        assert_eq!(workspace.calls(), vec![Call::UpdateJob(2)]);
        assert_eq!(workspace.on_failure(1), None);
        assert_eq!(workspace.on_failure(3), None);
        assert_eq!(report.total_jobs, Some(3));
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].job_name, "B");
    }

    #[tokio::test]
    async fn test_duplicate_names_are_all_configured() {
        let workspace = FakeWorkspace::new(json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2, "settings": { "name": "A" } },
            { "job_id": 3, "settings": { "name": "B" } }
        ]));
        configure_jobs(&workspace, &request(&["A"]), &mut RunReport::default()).await.unwrap();
        assert_eq!(workspace.calls(), vec![Call::UpdateJob(1), Call::UpdateJob(2)]);
    }

    #[tokio::test]
    async fn test_missing_notification_touches_nothing() {
        let workspace = FakeWorkspace::new(two_jobs());
        let mut report = RunReport::default();
        let request = ConfigureRequest { notification_id: "N2".to_string(), ..request(&[]) };
        let err = configure_jobs(&workspace, &request, &mut report).await.unwrap_err();

        assert!(format!("{err:#}").contains("RESOURCE_DOES_NOT_EXIST"));
        assert!(workspace.calls().is_empty());
        assert_eq!(report, RunReport::default());
    }

    #[tokio::test]
    async fn test_missing_service_principal_touches_nothing() {
        let workspace = FakeWorkspace::new(two_jobs());
        let mut report = RunReport::default();
        let request =
            ConfigureRequest { service_principal: Some("P9".to_string()), ..request(&[]) };
        let err = configure_jobs(&workspace, &request, &mut report).await.unwrap_err();

        assert_eq!(err.to_string(), "Service principal with application ID P9 not found");
        assert!(workspace.calls().is_empty());
        assert_eq!(report.total_jobs, None);
    }

    #[tokio::test]
    async fn test_grants_can_view_on_every_run() {
        let workspace = FakeWorkspace::new(two_jobs());
        let request =
            ConfigureRequest { service_principal: Some("P1".to_string()), ..request(&[]) };
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request, &mut report).await.unwrap();

        let grant = JobAccessControlRequest::service_principal("P1", VIEWER_PERMISSION);
        assert_eq!(workspace.acl(1), vec![grant.clone()]);
        assert_eq!(workspace.acl(2), vec![grant.clone()]);
        assert_eq!(workspace.calls(), vec![
            Call::UpdateJob(1),
            Call::UpdatePermissions(1),
            Call::UpdatePermissions(2),
        ]);
        assert!(report.outcomes.iter().all(|o| o.permission == Some(StepOutcome::Configured)));

        // Grants aren't deduplicated
        configure_jobs(&workspace, &request, &mut RunReport::default()).await.unwrap();
        assert_eq!(workspace.acl(1), vec![grant.clone(), grant]);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_per_job() {
        let mut workspace = FakeWorkspace::new(json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2, "settings": { "name": "B" } },
            { "job_id": 3, "settings": { "name": "C" } }
        ]));
        workspace.failing_updates.insert(1);
        workspace.failing_permissions.insert(2);
        let request =
            ConfigureRequest { service_principal: Some("P1".to_string()), ..request(&[]) };
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request, &mut report).await.unwrap();

        let [a, b, c] = report.outcomes.as_slice() else {
            panic!("expected three outcomes");
        };
        assert_eq!(a.webhook, StepOutcome::Failed("PERMISSION_DENIED: cannot update job 1".into()));
        assert_eq!(a.permission, Some(StepOutcome::Configured));
        assert_eq!(b.webhook, StepOutcome::Configured);
        assert!(b.permission.as_ref().is_some_and(StepOutcome::is_failed));
        assert_eq!(c.webhook, StepOutcome::Configured);
        assert_eq!(c.permission, Some(StepOutcome::Configured));
        assert_eq!(workspace.on_failure(1), None);
        assert_eq!(workspace.on_failure(3), Some(vec!["N1".to_string()]));
    }

    #[tokio::test]
    async fn test_job_without_settings_stops_the_run() {
        let workspace = FakeWorkspace::new(json!([
            { "job_id": 1, "settings": { "name": "A" } },
            { "job_id": 2 },
            { "job_id": 3, "settings": { "name": "C" } }
        ]));
        let mut report = RunReport::default();
        let err = configure_jobs(&workspace, &request(&[]), &mut report).await.unwrap_err();

        assert_eq!(err.to_string(), "Job 2 has no settings");
        assert_eq!(workspace.calls(), vec![Call::UpdateJob(1)]);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(workspace.on_failure(3), None);
    }

    #[tokio::test]
    async fn test_empty_name_filter_matches_no_named_job() {
        let workspace = FakeWorkspace::new(two_jobs());
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request(&[""]), &mut report).await.unwrap();

        assert!(workspace.calls().is_empty());
        assert!(report.outcomes.is_empty());
        assert_eq!(workspace.on_failure(1), None);
    }

    #[tokio::test]
    async fn test_unnamed_job_never_matches_its_label() {
        let workspace = FakeWorkspace::new(json!([
            { "job_id": 7, "settings": {} },
            { "job_id": 8, "settings": { "name": "B" } }
        ]));
        let mut report = RunReport::default();
        configure_jobs(&workspace, &request(&["job 7"]), &mut report).await.unwrap();
        assert!(workspace.calls().is_empty());
        assert!(report.outcomes.is_empty());

        // Without a filter the unnamed job is configured under its label
        configure_jobs(&workspace, &request(&[]), &mut report).await.unwrap();
        assert_eq!(workspace.calls(), vec![Call::UpdateJob(7), Call::UpdateJob(8)]);
        assert_eq!(report.outcomes[0].job_name, "job 7");
    }
}
