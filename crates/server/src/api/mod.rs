pub mod audit;
pub mod comics;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
