#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

pub use helpers::TestContext;
