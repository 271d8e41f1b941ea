pub mod config;
pub mod crtp;
pub mod error;
pub mod grading;
pub mod link;
pub mod util;
pub mod web;
