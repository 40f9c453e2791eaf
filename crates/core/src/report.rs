use std::fmt;

use crate::models::{JobId, VIEWER_PERMISSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Configured,
    AlreadyConfigured,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool { matches!(self, Self::Failed(_)) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub job_name: String,
    pub webhook: StepOutcome,
    /// `None` when permissions weren't requested.
    pub permission: Option<StepOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub configured: usize,
    pub already_configured: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} configured, {} already configured, {} failed",
            self.configured, self.already_configured, self.failed
        )
    }
}

/// Result of a run, filled in as jobs are processed.
///
/// The caller owns the report so that outcomes recorded before a fatal
/// error are still available. An echoing report also prints each line as
/// soon as it's recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of jobs in the workspace, before filtering. `None` until listed.
    pub total_jobs: Option<usize>,
    pub outcomes: Vec<JobOutcome>,
    echo: bool,
}

impl RunReport {
    pub fn echoing() -> Self { Self { echo: true, ..Default::default() } }

    pub fn set_total_jobs(&mut self, total: usize) {
        self.total_jobs = Some(total);
        if self.echo {
            print_line(false, &header_line(total));
        }
    }

    pub fn record(&mut self, outcome: JobOutcome) {
        if self.echo {
            for (err, line) in outcome_lines(&outcome) {
                print_line(err, &line);
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        let steps = self
            .outcomes
            .iter()
            .flat_map(|o| std::iter::once(&o.webhook).chain(o.permission.as_ref()));
        for step in steps {
            match step {
                StepOutcome::Configured => summary.configured += 1,
                StepOutcome::AlreadyConfigured => summary.already_configured += 1,
                StepOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Console lines, in order. `true` marks lines meant for stderr.
    pub fn lines(&self) -> Vec<(bool, String)> {
        let mut out = Vec::with_capacity(self.outcomes.len() * 2 + 1);
        if let Some(total) = self.total_jobs {
            out.push((false, header_line(total)));
        }
        for outcome in &self.outcomes {
            out.extend(outcome_lines(outcome));
        }
        out
    }
}

fn print_line(err: bool, line: &str) {
    if err {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

fn header_line(total: usize) -> String {
    format!("Configuring the Monte Carlo webhook for {total} jobs")
}

fn outcome_lines(outcome: &JobOutcome) -> Vec<(bool, String)> {
    let name = &outcome.job_name;
    let mut out = Vec::with_capacity(2);
    out.push(match &outcome.webhook {
        StepOutcome::Configured => {
            (false, format!("Successfully added the Monte Carlo webhook to {name}"))
        }
        StepOutcome::AlreadyConfigured => {
            (false, format!("The Monte Carlo webhook is already configured for {name}"))
        }
        StepOutcome::Failed(reason) => {
            (true, format!("Failed to add the Monte Carlo webhook to {name} due to {reason}"))
        }
    });
    let level = VIEWER_PERMISSION;
    match &outcome.permission {
        None => {}
        Some(StepOutcome::Failed(reason)) => out.push((
            true,
            format!(
                "Failed to give {level} permissions to the Monte Carlo Service Principal for {name} due to {reason}"
            ),
        )),
        Some(_) => out.push((
            false,
            format!(
                "Successfully gave {level} permissions to the Monte Carlo Service Principal for {name}"
            ),
        )),
    }
    out
}
