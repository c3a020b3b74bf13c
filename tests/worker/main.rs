#[path = "../common/mod.rs"]
mod common;

mod thread_delivery;
