pub mod audit;
pub mod rate_limit;
pub mod request_id;
pub mod tenant_scope;
