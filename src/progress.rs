//! Progress display for stack runs

use declarative::{ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use naming::ResourceKind;

use crate::ui;

/// Symbol shown next to a settled resource
pub fn symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created | ApplyResult::Modified => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"))
}

/// One progress bar per wave
pub struct WaveProgress {
    quiet: bool,
    wave: usize,
    bar: Option<ProgressBar>,
}

impl WaveProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            wave: 0,
            bar: None,
        }
    }
}

impl ProgressCallback for WaveProgress {
    fn on_wave_start(&mut self, count: usize, preview: bool) {
        self.wave += 1;
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(count as u64)
        };
        bar.set_style(bar_style());
        bar.set_prefix(format!(
            "{} wave {}",
            if preview { "Previewing" } else { "Applying" },
            self.wave
        ));
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, kind: ResourceKind, name: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{kind} {name}"));
        }
    }

    fn on_resource_complete(&mut self, kind: ResourceKind, name: &str, result: &ApplyResult) {
        match &self.bar {
            Some(bar) => {
                bar.set_message(format!("{} {}", symbol(result), name));
                if let ApplyResult::Failed { error } = result {
                    bar.println(format!("  ✗ {kind} {name}: {error}"));
                }
                bar.inc(1);
            }
            // Skips and cancellations settle between waves
            None if !self.quiet => {
                if let ApplyResult::Skipped { reason } = result {
                    ui::warn(&format!("Skipped {kind} {name}: {reason}"));
                }
            }
            None => {}
        }
    }

    fn on_wave_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols() {
        assert_eq!(symbol(&ApplyResult::Created), "✓");
        assert_eq!(symbol(&ApplyResult::NoChange), "○");
        assert_eq!(
            symbol(&ApplyResult::Skipped {
                reason: "upstream".into()
            }),
            "⊘"
        );
    }

    #[test]
    fn test_quiet_progress_runs_without_terminal() {
        let mut progress = WaveProgress::new(true);
        progress.on_wave_start(2, false);
        progress.on_resource_start(ResourceKind::ResourceGroup, "acmedeveuswebrg00");
        progress.on_resource_complete(
            ResourceKind::ResourceGroup,
            "acmedeveuswebrg00",
            &ApplyResult::Created,
        );
        progress.on_wave_complete();
        assert!(progress.bar.is_none());
        assert_eq!(progress.wave, 1);
    }
}
