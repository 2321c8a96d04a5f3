#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod browser_controller;
pub mod page_capture;
pub mod runner;
pub mod types;
pub mod utils;
