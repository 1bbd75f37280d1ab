//! Core: Application, Module, Runner.

pub mod app;
pub mod module;
pub mod runner;

pub use app::Application;
pub use module::Module;
pub use runner::Runner;
