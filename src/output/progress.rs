use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Spinner for the three collection phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_tests() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(bright_yellow("Phase 1/3: Parsing test reports").to_string());
        Self { pb }
    }

    pub fn finish_tests_start_benchmarks(self, tests: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Parsed {tests} tests ✓")).to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 2/3: Mapping benchmarks").to_string());
        Self { pb }
    }

    pub fn finish_benchmarks_start_op_tests(self, runs: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 2/3: Mapped {runs} benchmark runs ✓")).to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 3/3: Parsing op tests").to_string());
        Self { pb }
    }

    pub fn finish_op_tests(self, op_tests: usize) {
        self.pb.finish_with_message(
            bright_green(format!("Phase 3/3: Parsed {op_tests} op tests ✓")).to_string(),
        );
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_spinner()
        .template("  {msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
