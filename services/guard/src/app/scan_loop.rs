//! services/guard/src/app/scan_loop.rs
//!
//! The interactive scan session: reads decoded codes from the capture
//! stream, feeds them to the `ScanController` and tells the guard what
//! happened.
//!
//! Lines starting with `/` are session commands rather than codes.

use futures::StreamExt;
use patrol_core::ports::{CodeStream, NoticeLevel, SessionStore};
use patrol_core::{
    points, PointId, ScanController, ScanFailure, ScanOutcome, ScanStatus, ScannedPoints,
    TOTAL_PATROL_POINTS,
};
use tracing::{debug, info};

use crate::adapters::QrCapture;
use crate::app::state::AppContext;
use crate::error::GuardError;

/// Why a scan session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The capture input reached end of file.
    InputClosed,
    Quit,
    /// The server rejected the session; the guard must sign in again.
    SignedOut,
}

enum Command {
    Resume,
    Retry,
    Reset,
    Progress,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let name = line.strip_prefix('/')?;
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "resume" => Self::Resume,
            "retry" => Self::Retry,
            "reset" => Self::Reset,
            "progress" => Self::Progress,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Runs a scan session until the input ends, the guard quits, or the
/// session is rejected by the server.
pub async fn run_scan_session(
    ctx: &AppContext,
    mut codes: CodeStream,
) -> Result<SessionEnd, GuardError> {
    let user = ctx
        .store
        .current_user()
        .await?
        .ok_or(GuardError::NotSignedIn)?;
    let mut controller = ScanController::new(ctx.scan_ports()).await?;
    let mut capture = QrCapture::default();
    let feedback = ctx.feedback.as_ref();

    info!(guard = %user.guard_name, "Scan session started");
    feedback.show_info(&format!(
        "{} - {}\n{}",
        ctx.config.app_name,
        user.guard_name.trim(),
        progress_line(controller.scanned_points())
    ));

    let mut link_rx = ctx.connectivity.subscribe();
    let mut server_rx = ctx.server_status.subscribe();
    let mut server_online = server_rx.borrow().online;

    loop {
        let line = tokio::select! {
            line = codes.next() => match line {
                Some(line) => line,
                None => break,
            },
            Ok(()) = link_rx.changed() => {
                if *link_rx.borrow() {
                    feedback.show_info("Network connection restored");
                } else {
                    feedback.show_warning("Network connection lost");
                }
                continue;
            }
            Ok(()) = server_rx.changed() => {
                let online = server_rx.borrow().online;
                if online != server_online {
                    server_online = online;
                    if online {
                        feedback.show_info("Server is back online");
                    } else {
                        feedback.show_warning("Server Offline");
                    }
                }
                continue;
            }
        };

        if let Some(command) = Command::parse(&line) {
            match command {
                Command::Resume => {
                    capture.activate();
                    controller.resume_scanning();
                    feedback.show_info("Scanner ready");
                }
                Command::Retry => {
                    if controller.status() == ScanStatus::NoInternet {
                        controller.retry_connectivity().await;
                    } else {
                        feedback.show_info("Connection is not blocking scans");
                    }
                }
                Command::Reset => {
                    controller.reset_progress().await?;
                    capture.activate();
                    controller.resume_scanning();
                }
                Command::Progress => {
                    feedback.show_info(&progress_report(controller.scanned_points()));
                }
                Command::Quit => return Ok(SessionEnd::Quit),
                Command::Unknown(name) => {
                    feedback.show_warning(&format!(
                        "Unknown command /{}. Use /resume, /retry, /reset, /progress or /quit",
                        name
                    ));
                }
            }
            continue;
        }

        let Some(code) = capture.detect(&line) else {
            debug!(code = %line, "Capture inactive or throttled");
            if !capture.is_active() {
                feedback.show_info("Scanner paused. Type /resume to scan the next point");
            }
            continue;
        };

        let Some(outcome) = controller.handle_scan(&code).await else {
            if controller.status() == ScanStatus::NoInternet {
                feedback.show_warning("No internet connection. Type /retry to check again");
            }
            continue;
        };

        if let Some(end) = present(&mut controller, &mut capture, ctx, &outcome) {
            return Ok(end);
        }
    }

    info!(
        scanned = controller.scanned_points().len(),
        "Scan input closed"
    );
    Ok(SessionEnd::InputClosed)
}

/// Shows one outcome and returns the session end, if any.
fn present(
    controller: &mut ScanController,
    capture: &mut QrCapture,
    ctx: &AppContext,
    outcome: &ScanOutcome,
) -> Option<SessionEnd> {
    let feedback = ctx.feedback.as_ref();
    if outcome.stop_capture() {
        capture.deactivate();
    }

    match outcome {
        ScanOutcome::Debounced => {}
        ScanOutcome::AlreadyScanned(point) => {
            debug!(%point, "Duplicate scan ignored");
        }
        ScanOutcome::Recorded { completed, .. } => {
            feedback.toast(NoticeLevel::Success, &outcome.message());
            controller.dismiss();
            if *completed {
                feedback.show_info("Patrol complete. Type /reset to start a new patrol");
            }
        }
        ScanOutcome::Failed { failure, .. } => {
            feedback.toast(NoticeLevel::Error, &outcome.message());
            match failure {
                ScanFailure::Unauthenticated => return Some(SessionEnd::SignedOut),
                ScanFailure::Offline => {
                    feedback.show_warning("Type /retry once the connection is back");
                }
                _ => controller.dismiss(),
            }
        }
    }

    if outcome.stop_capture() {
        feedback.show_info("Scanner paused. Type /resume to scan the next point");
    }
    None
}

fn progress_line(scanned: &ScannedPoints) -> String {
    format!("Progress: {}/{} points", scanned.len(), TOTAL_PATROL_POINTS)
}

/// Progress plus the names of the points still to visit.
fn progress_report(scanned: &ScannedPoints) -> String {
    let remaining: Vec<String> = PointId::all()
        .filter(|p| !scanned.contains(*p))
        .map(|p| format!("{} ({})", p, points::point_name(&p.to_string())))
        .collect();
    if remaining.is_empty() {
        format!("{}\nAll patrol points completed", progress_line(scanned))
    } else {
        format!(
            "{}\nRemaining: {}",
            progress_line(scanned),
            remaining.join(", ")
        )
    }
}
