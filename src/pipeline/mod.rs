// Pipeline module entrypoint
pub mod dispatcher; // drains the source, batches, routes to one worker
pub mod pool;       // live worker set + full-mesh peer bookkeeping
pub mod worker;     // work-stealing processing loop

pub use pool::{WorkerContext, WorkerId, WorkerPool};
