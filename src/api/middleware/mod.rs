pub mod hmac;

pub use hmac::hmac_auth_middleware;
