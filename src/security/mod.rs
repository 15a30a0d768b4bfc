pub mod hmac_signature;
