pub mod audit;
pub mod cleanup;
pub mod rate_limit;
pub mod request_code;
pub mod token;
pub mod verify_code;
