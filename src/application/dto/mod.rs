//! Data Transfer Objects

mod carve_report;
mod scan_options;

pub use carve_report::CarveReport;
pub use scan_options::ScanOptions;
