use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::{GenerationPhase, GenerationStatus};
use crate::step::StepKind;
use crate::timeline::{Timeline, TimelineStyle};
use crate::ui::icons::{CHECK, CLOCK, CROSS, PAUSE, SPARKLE};

/// Resolution of the progress bar; fractional progress is shown in tenths of a percent.
const BAR_LENGTH: u64 = 1000;

/// Terminal view of one generation session, rendered via an `indicatif` bar.
///
/// The bar is driven by [`GenerationStatus`] snapshots, either pushed through
/// [`Self::render`] or pulled from the controller's watch channel with
/// [`Self::follow`]. Step transitions are printed above the bar in verbose mode.
pub struct GenerationUI {
    bar: ProgressBar,
    verbose: bool,
    last_step: Mutex<Option<StepKind>>,
}

impl GenerationUI {
    pub fn new(verbose: bool) -> Self {
        let bar_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let bar = ProgressBar::new(BAR_LENGTH);
        bar.set_style(bar_style);
        bar.set_prefix("Timeline");
        Self::with_bar(bar, verbose)
    }

    /// A UI that draws nothing, for non-interactive output.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden(), false)
    }

    fn with_bar(bar: ProgressBar, verbose: bool) -> Self {
        Self {
            bar,
            verbose,
            last_step: Mutex::new(None),
        }
    }

    /// Print a line above the bar. Hidden bars print nothing.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }

    pub fn start(&self, decision: &str, timeline_style: TimelineStyle) {
        self.print_line(format!(
            "{} Imagining futures for {} {}",
            SPARKLE,
            style(format!("\"{}\"", decision.trim())).bold(),
            style(format!("({})", timeline_style)).dim()
        ));
        self.bar.set_position(0);
        self.bar.set_message(style("starting...").dim().to_string());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Apply one status snapshot to the bar.
    pub fn render(&self, status: &GenerationStatus) {
        self.bar.set_position(bar_position(status.progress));
        self.bar.set_message(status_message(status));

        let Some(step) = status.current_step else {
            return;
        };
        let mut last = self.last_step.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != Some(step) {
            *last = Some(step);
            if self.verbose {
                self.print_line(format!(
                    "    {} {}",
                    style("→").dim(),
                    style(step.display_name()).dim()
                ));
            }
        }
    }

    /// Render every status published on `rx` until the sender goes away.
    pub fn follow(self: &Arc<Self>, mut rx: watch::Receiver<GenerationStatus>) -> JoinHandle<()> {
        let ui = Arc::clone(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().clone();
                ui.render(&status);
            }
        })
    }

    pub fn finish_success(&self, timeline: &Timeline) {
        self.bar.set_position(BAR_LENGTH);
        self.bar.finish_and_clear();
        self.print_line(format!(
            "{} {} {}",
            CHECK,
            style("Timeline ready:").green().bold(),
            timeline.title
        ));
    }

    pub fn finish_paused(&self) {
        self.bar.abandon_with_message(format!("{}paused", PAUSE));
    }

    pub fn finish_error(&self, message: &str) {
        self.bar.abandon();
        self.print_line(format!(
            "{} {}",
            CROSS,
            style(format!("Generation failed: {}", message)).red().bold()
        ));
    }
}

fn bar_position(progress: f64) -> u64 {
    if !progress.is_finite() {
        return 0;
    }
    (progress.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64
}

/// `Xs` or `Xm Ys`.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// One-line description of a status snapshot.
pub fn status_message(status: &GenerationStatus) -> String {
    match status.phase {
        GenerationPhase::Idle if status.progress >= 1.0 => "done".to_string(),
        GenerationPhase::Idle => "idle".to_string(),
        GenerationPhase::Failed => format!(
            "failed: {}",
            status.error.as_deref().unwrap_or("unknown error")
        ),
        GenerationPhase::Running => {
            let step = status
                .current_step
                .map(|s| s.display_name())
                .unwrap_or("Working");
            match status.estimated_time_remaining {
                Some(remaining) => format!(
                    "{} {}{}",
                    step,
                    CLOCK,
                    style(format_remaining(remaining)).dim()
                ),
                None => step.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(progress: f64, step: StepKind, remaining: u64) -> GenerationStatus {
        GenerationStatus {
            phase: GenerationPhase::Running,
            progress,
            current_step: Some(step),
            estimated_time_remaining: Some(Duration::from_secs(remaining)),
            ..GenerationStatus::default()
        }
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(0)), "0s");
        assert_eq!(format_remaining(Duration::from_secs(59)), "59s");
        assert_eq!(format_remaining(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_bar_position_clamps() {
        assert_eq!(bar_position(0.5883), 588);
        assert_eq!(bar_position(-0.2), 0);
        assert_eq!(bar_position(1.7), BAR_LENGTH);
        assert_eq!(bar_position(f64::NAN), 0);
    }

    #[test]
    fn test_status_message_by_phase() {
        let msg = status_message(&running(0.4, StepKind::CreatingVisuals, 25));
        assert!(msg.starts_with("Creating visuals"));
        assert!(msg.contains("25s"));

        let failed = GenerationStatus {
            phase: GenerationPhase::Failed,
            error: Some("boom".to_string()),
            ..GenerationStatus::default()
        };
        assert_eq!(status_message(&failed), "failed: boom");
        assert_eq!(status_message(&GenerationStatus::idle()), "idle");

        let mut done = GenerationStatus::idle();
        done.progress = 1.0;
        assert_eq!(status_message(&done), "done");
    }

    #[test]
    fn test_render_tracks_step_changes() {
        let ui = GenerationUI::hidden();
        ui.render(&running(0.1, StepKind::AnalyzingDecision, 80));
        ui.render(&running(0.3, StepKind::GeneratingPerspectives, 60));

        assert_eq!(
            *ui.last_step.lock().unwrap(),
            Some(StepKind::GeneratingPerspectives)
        );
    }

    #[tokio::test]
    async fn test_follow_stops_when_sender_dropped() {
        let ui = Arc::new(GenerationUI::hidden());
        let (tx, rx) = watch::channel(GenerationStatus::idle());
        let handle = ui.follow(rx);

        tx.send_replace(running(0.5, StepKind::RenderingVideo, 10));
        drop(tx);

        handle.await.unwrap();
        assert_eq!(*ui.last_step.lock().unwrap(), Some(StepKind::RenderingVideo));
    }
}
