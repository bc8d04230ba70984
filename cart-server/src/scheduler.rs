//! Cron loop driving the task registry. One task fires at a time; a task
//! that overruns simply delays the next due one, which is fine at the
//! nightly cadences these run at.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::tasks::TaskRegistry;

/// Spawns the scheduler loop. Tasks with an unparsable cron string are
/// reported once and skipped, not retried forever.
pub fn spawn(tasks: Arc<TaskRegistry>) {
    let mut schedules = Vec::new();
    for task in tasks.all() {
        if !task.enabled() {
            continue;
        }
        match Schedule::from_str(task.cron()) {
            Ok(schedule) => {
                info!("Scheduled task {} ({})", task.name(), task.cron());
                schedules.push((task.clone(), schedule));
            }
            Err(e) => error!(
                "Task {} has an invalid cron string {:?}: {}",
                task.name(),
                task.cron(),
                e
            ),
        }
    }
    if schedules.is_empty() {
        info!("No scheduled tasks enabled");
        return;
    }

    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = schedules
                .iter()
                .filter_map(|(task, schedule)| {
                    schedule.after(&now).next().map(|at| (task.clone(), at))
                })
                .min_by_key(|(_, at)| *at);

            let Some((task, at)) = next else {
                warn!("No upcoming task occurrence; scheduler stopping");
                return;
            };

            let wait = (at - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            info!("Running scheduled task {}", task.name());
            if let Err(e) = task.run().await {
                error!("Scheduled task {} failed: {}", task.name(), e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_field_cron_strings_parse() {
        // The defaults shipped in AppConfig::from_env.
        for cron in ["0 0 3 * * *", "0 0 4 * * *", "0 0 5 * * *"] {
            let schedule = Schedule::from_str(cron).unwrap();
            assert!(schedule.after(&Utc::now()).next().is_some());
        }
        assert!(Schedule::from_str("not a cron").is_err());
    }
}
