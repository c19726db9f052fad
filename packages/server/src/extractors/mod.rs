pub mod json;
pub mod principal;
