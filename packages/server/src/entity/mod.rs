pub mod application;
pub mod binding;
pub mod build_run;
pub mod dependent;
pub mod workload;
