#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod features;
pub mod labels;
pub mod pipeline;
pub mod samples;

#[path = "../models/mod.rs"]
pub mod models;

#[path = "../evaluate/mod.rs"]
pub mod evaluate;

#[path = "../loader/mod.rs"]
pub mod loader;

#[path = "../report/mod.rs"]
pub mod report;
