pub mod limiter;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use limiter::AuthFailureLimiter;
pub use middleware::admission_middleware;
pub use tokens::{Claims, TokenService, TokenUse};
