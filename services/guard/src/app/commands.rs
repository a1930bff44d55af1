//! services/guard/src/app/commands.rs
//!
//! One function per CLI subcommand other than `scan`. Each returns data and
//! leaves printing to the binary.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use patrol_core::ports::{ConnectivityProbe, ProgressStore, SessionStore};
use patrol_core::records;
use patrol_core::report::ReportRange;
use patrol_core::{
    FilterOptions, PatrolReport, RecordPage, RecordQuery, ScannedPoints, ServerStatus,
    UserProfile,
};
use serde::Serialize;
use tracing::info;

use crate::app::state::AppContext;
use crate::error::GuardError;

//=========================================================================================
// Session
//=========================================================================================

/// Signs in and stores the profile on the device.
pub async fn login(
    ctx: &AppContext,
    username: &str,
    password: &str,
) -> Result<UserProfile, GuardError> {
    let user = ctx.api.login(username.trim(), password).await?;
    if user.guard_name().is_none() {
        return Err(GuardError::Internal(
            "Login succeeded but the account has no guard name".to_string(),
        ));
    }
    ctx.store.save_login(&user, None).await?;
    info!(user_id = user.user_id, guard = %user.guard_name, "Signed in");
    Ok(user)
}

/// Forgets the user and the patrol progress.
pub async fn logout(ctx: &AppContext) -> Result<(), GuardError> {
    ctx.store.clear_session().await?;
    Ok(())
}

pub async fn whoami(ctx: &AppContext) -> Result<UserProfile, GuardError> {
    require_user(ctx).await
}

async fn require_user(ctx: &AppContext) -> Result<UserProfile, GuardError> {
    ctx.store
        .current_user()
        .await?
        .ok_or(GuardError::NotSignedIn)
}

//=========================================================================================
// Status and Progress
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub api: String,
    pub link_online: bool,
    pub reachable: bool,
    pub server: ServerStatus,
}

/// Probes connectivity and the server side by side.
pub async fn status(ctx: &AppContext) -> StatusReport {
    let (reachable, server) = futures::join!(
        ctx.connectivity.probe(),
        ctx.server_status.check_now(ctx.api.as_ref())
    );
    StatusReport {
        api: ctx.config.api_base_url.to_string(),
        link_online: ctx.connectivity.is_online(),
        reachable,
        server,
    }
}

pub async fn progress(ctx: &AppContext) -> Result<ScannedPoints, GuardError> {
    Ok(ctx.store.load_points().await?)
}

/// Starts a new patrol outside a scan session.
pub async fn reset(ctx: &AppContext) -> Result<(), GuardError> {
    ctx.store.clear_points().await?;
    info!("Patrol progress reset");
    ctx.feedback
        .show_info("Patrol progress reset. Ready to start a new patrol.");
    Ok(())
}

//=========================================================================================
// Records and Reports
//=========================================================================================

/// Local midnight of `from` to the last second of `to`, either end optional.
pub fn day_bounds(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let at = |day: NaiveDate, time: NaiveTime| {
        Local
            .from_local_datetime(&day.and_time(time))
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    };
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (
        from.and_then(|d| at(d, NaiveTime::MIN)),
        to.and_then(|d| at(d, end_of_day)),
    )
}

/// One page of records.
pub async fn logs(ctx: &AppContext, query: &RecordQuery) -> Result<RecordPage, GuardError> {
    require_user(ctx).await?;
    Ok(ctx.api.list_records(query).await?)
}

/// Builds the patrol report over every matching record. Without explicit
/// dates the report covers the last seven days.
pub async fn report(
    ctx: &AppContext,
    mut filter: FilterOptions,
) -> Result<PatrolReport, GuardError> {
    require_user(ctx).await?;
    let range = match (filter.start_date, filter.end_date) {
        (None, None) => {
            let range = ReportRange::default_for(&Local::now());
            filter.start_date = Some(range.start);
            filter.end_date = Some(range.end);
            Some(range)
        }
        (Some(start), Some(end)) => Some(ReportRange { start, end }),
        _ => None,
    };

    let records = records::fetch_all(ctx.api.as_ref(), &filter).await?;
    info!(records = records.len(), "Building patrol report");
    let title = format!("{} Patrol Report", ctx.config.app_name);
    Ok(PatrolReport::build(&title, &records, range))
}

/// Downloads a record image to `out`. Returns the number of bytes written.
pub async fn image(ctx: &AppContext, image_id: &str, out: &Path) -> Result<usize, GuardError> {
    require_user(ctx).await?;
    let bytes = records::fetch_image(ctx.api.as_ref(), image_id).await?;
    tokio::fs::write(out, &bytes).await?;
    info!(image_id, path = %out.display(), bytes = bytes.len(), "Image saved");
    Ok(bytes.len())
}
