mod application;
mod binding;
mod common;
mod dependent;
mod staging;
