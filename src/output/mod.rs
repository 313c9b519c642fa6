mod files;
mod progress;
mod styling;
mod summary;
mod tables;

pub use files::OutputWriter;
pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{print_summary, CollectSummary};

/// Prints the `cicollect` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📦 cicollect"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI artifact collector")
    );
}
