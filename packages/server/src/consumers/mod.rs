pub mod build_report;

pub use build_report::consume_build_reports;
