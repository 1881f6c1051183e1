
mod rate_limit_test;
mod request_code_test;
mod router_test;
