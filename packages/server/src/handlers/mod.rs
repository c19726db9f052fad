pub mod application;
pub mod binding;
pub mod dependent;
pub mod staging;
