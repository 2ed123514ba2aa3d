mod bootstrap;
mod config;
mod loop_runner;
mod operator;
mod scenario;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
