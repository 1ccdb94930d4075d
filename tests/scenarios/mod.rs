//! Build scenarios run against real project directories

mod bundling;
mod file_passthrough;
mod inline_optimization;
mod multi_build;
mod prefetch_links;
mod service_worker;
