use chrome_importer::ImportItem;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for one import item
pub fn create_item_spinner(item: ImportItem) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Importing {}...", item));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Update the spinner once records for the item have been written
pub fn record_written(pb: &ProgressBar, what: &str, count: usize) {
    pb.set_message(format!("Wrote {} {}", count, what));
}

/// Finish progress bar with success message
pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✅ {}", message));
}

/// Finish progress bar with error message
pub fn finish_with_error(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("❌ {}", message));
}
