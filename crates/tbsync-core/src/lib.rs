pub mod config;
pub mod observability;
pub mod path_validation;
