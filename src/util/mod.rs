// Scanner111 - util/mod.rs
//
// Utility modules: error types, named constants, logging setup,
// cancellation. No dependencies on core, app, or platform layers.

pub mod cancel;
pub mod constants;
pub mod error;
pub mod logging;
