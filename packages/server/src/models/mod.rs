pub mod application;
pub mod dependent;
pub mod shared;
pub mod staging;
