//! Loading indicator shown while the pipeline is in flight
//!
//! Ensures the cursor is restored on drop (even on panic).

use std::io::{stdout, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use eldia_core::{CancellationToken, PipelineStage};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Guard that hides the cursor and shows it again on drop.
pub struct CursorGuard;

impl CursorGuard {
    pub fn hide() -> Result<Self> {
        execute!(stdout(), Hide)?;
        Ok(Self)
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        // Best-effort restore - ignore errors during cleanup
        let _ = execute!(stdout(), Show);
    }
}

/// Human label for a pipeline stage
pub fn stage_label(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Pending => "Starting",
        PipelineStage::FetchingToken => "Signing in and fetching card",
        PipelineStage::Rendering => "Rendering QR code",
        PipelineStage::Ready => "Done",
        PipelineStage::Failed(_) => "Failed",
        PipelineStage::Cancelled => "Cancelled",
    }
}

/// Animated spinner driven by the pipeline stage
pub struct Spinner {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Spinner {
    pub fn start(stage: watch::Receiver<PipelineStage>) -> Self {
        let stop = CancellationToken::new();
        let task = tokio::spawn(spin(stage, stop.clone()));
        Self { stop, task }
    }

    /// Stop the animation and clear its line
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

async fn spin(stage: watch::Receiver<PipelineStage>, stop: CancellationToken) {
    let _cursor = CursorGuard::hide().ok();
    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut frame = 0usize;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let label = stage_label(*stage.borrow());
                let mut out = stdout();
                let _ = queue!(
                    out,
                    MoveToColumn(0),
                    Clear(ClearType::CurrentLine),
                    Print(format!("{} {}...", FRAMES[frame % FRAMES.len()], label)),
                );
                let _ = out.flush();
                frame += 1;
            }
        }
    }

    let _ = execute!(stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine));
}
