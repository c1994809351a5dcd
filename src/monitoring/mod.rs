/*!
 * Monitoring
 * Structured logging setup and processing-run spans
 */

mod tracer;

pub use tracer::{init_tracing, RunSpan};
