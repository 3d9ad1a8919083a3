//! HTTP presentation layer

mod routes;

pub use routes::{build_router, AppError};
