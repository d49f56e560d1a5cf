pub mod artifact;
pub mod detail;
pub mod project;
