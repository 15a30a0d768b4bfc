//! HMAC 签名原语
//! 入站请求验证和出站 webhook 签名共用同一套算法：
//! HMAC-SHA256(secret, body || timestamp)，十六进制编码

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// 对 body + timestamp 计算十六进制 HMAC-SHA256 签名
pub fn sign(body: &[u8], timestamp: &str, secret: &str) -> String {
    // HMAC 允许任意长度 key，new_from_slice 不会失败
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 常数时间校验签名
pub fn verify(body: &[u8], timestamp: &str, signature: &str, secret: &str) -> bool {
    let expected = sign(body, timestamp, secret);
    // 长度不等直接失败；相等时做常数时间比较
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256('{"a":1}' || '1700000000000', key='s')
        let sig = sign(br#"{"a":1}"#, "1700000000000", "s");
        assert_eq!(
            sig,
            "ee9e27cb48db9c3b564ca287c53f71a1fcf174c2ebd892b8070030b58e84c7e5"
        );
    }

    #[test]
    fn test_verify_accepts_valid() {
        let body = br#"{"type":"withdrawal","userId":"7"}"#;
        let ts = "2024-01-01T00:00:00Z";
        let sig = sign(body, ts, "secret");
        assert!(verify(body, ts, &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_tampered() {
        let body = br#"{"amount":"1.0"}"#;
        let ts = "1700000000000";
        let sig = sign(body, ts, "secret");

        assert!(!verify(br#"{"amount":"9.0"}"#, ts, &sig, "secret"));
        assert!(!verify(body, "1700000000001", &sig, "secret"));
        assert!(!verify(body, ts, &sig, "other-secret"));
        assert!(!verify(body, ts, "deadbeef", "secret"));
    }

    #[test]
    fn test_timestamp_concatenation_matters() {
        // body+ts 的拼接边界移动必须改变签名
        let a = sign(b"ab", "c", "k");
        let b = sign(b"a", "bc", "k");
        assert_eq!(a, b); // 同一拼接字节串
        assert_ne!(sign(b"ab", "", "k"), a);
    }
}
