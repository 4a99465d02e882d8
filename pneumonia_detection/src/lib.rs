mod model_host;
mod model_service;
mod ort_service;
mod routes;
mod server;
mod telemetry;

#[cfg(test)]
mod testing;

pub mod app;
pub mod codec;
pub mod config;
pub mod prediction;
pub mod preprocess;

pub use app::start_app;
