use crate::reminder::ProcessDueRemindersUseCase;
use crate::shared::usecase::execute;
use capsule_keeper_infra::CapsuleContext;
use std::time::Duration;
use tracing::info;

/// Starts the built-in dispatch job when an interval is configured. The
/// external trigger endpoint works either way, so deployments that rely on an
/// outside cron leave the interval at 0.
pub fn start_dispatch_job(ctx: CapsuleContext) {
    let interval_secs = ctx.config.dispatch_interval_secs;
    if interval_secs == 0 {
        info!("Built-in dispatch job is disabled, dispatch only runs on the external trigger");
        return;
    }
    info!("Starting dispatch job with an interval of {}s", interval_secs);

    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let _ = execute(ProcessDueRemindersUseCase, &ctx).await;
        }
    });
}
