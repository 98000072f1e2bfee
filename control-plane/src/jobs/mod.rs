pub mod worker;

pub use worker::{run_forever, run_once, WorkerContext};
