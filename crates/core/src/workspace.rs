use anyhow::Result;

use crate::models::{
    Job, JobAccessControlRequest, JobId, JobSettings, NotificationDestination, ServicePrincipal,
};

/// The workspace API calls the configurator needs.
///
/// Implemented over HTTP by `mcd-jobs-databricks` and by an in-memory fake in tests.
#[allow(async_fn_in_trait)]
pub trait Workspace {
    /// Fails if the destination doesn't exist.
    async fn get_notification_destination(&self, id: &str) -> Result<NotificationDestination>;

    /// All jobs in the workspace, every page.
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Overwrites the top-level fields present in `new_settings`.
    async fn update_job(&self, job_id: JobId, new_settings: &JobSettings) -> Result<()>;

    /// All service principals in the workspace, every page.
    async fn list_service_principals(&self) -> Result<Vec<ServicePrincipal>>;

    /// Adds the given entries to the job's access control list.
    async fn update_job_permissions(
        &self,
        job_id: JobId,
        access_control_list: &[JobAccessControlRequest],
    ) -> Result<()>;
}
