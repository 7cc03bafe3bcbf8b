//! REST API over the project store and the snapshot store.
//!
//! Started by `tasknest serve`.

mod server;

pub use server::{ApiError, ApiServer, build_router, start_server};
