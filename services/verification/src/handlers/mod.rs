pub mod context;
pub mod health;
pub mod verification;
