pub(crate) mod async_task;

mod backoff;
pub use backoff::*;

pub mod time;
