pub mod auth;
pub mod code_rules;
pub mod customers;
pub mod health;
pub mod roles;
pub mod tenants;
pub mod users;
