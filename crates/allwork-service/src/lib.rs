mod blocking;
mod http;
mod memory;
pub mod realtime;
pub mod rest;
mod traits;

pub use blocking::BlockingService;
pub use http::HttpService;
pub use memory::{MemoryService, Op, DEMO_EMAIL, DEMO_PASSWORD};
pub use realtime::Subscription;
pub use traits::{ensure_profile, BoardService, ServiceError};
