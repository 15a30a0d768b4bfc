//! 钱包凭据加载
//!
//! 启动时读取一次：助记词、国库地址、国库签名私钥。
//! 进程运行期间不再变化，轮换需要重启。

use anyhow::{Context, Result};
use bip39::{Language, Mnemonic};
use ethers::types::Address;

/// 钱包凭据
///
/// Debug 输出做了脱敏，助记词和私钥不会出现在日志里。
#[derive(Clone)]
pub struct WalletCredentials {
    pub mnemonic: String,
    pub treasury_address: Address,
    pub treasury_private_key: String,
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("mnemonic", &"<redacted>")
            .field("treasury_address", &self.treasury_address)
            .field("treasury_private_key", &"<redacted>")
            .finish()
    }
}

impl WalletCredentials {
    /// 从环境变量加载并校验
    pub fn from_env() -> Result<Self> {
        let mnemonic = std::env::var("MNEMONIC").context("MNEMONIC must be set")?;
        Mnemonic::parse_in(Language::English, &mnemonic)
            .map_err(|e| anyhow::anyhow!("MNEMONIC is not a valid BIP39 phrase: {}", e))?;

        let treasury_address: Address = std::env::var("TREASURY_ADDRESS")
            .context("TREASURY_ADDRESS must be set")?
            .parse()
            .context("TREASURY_ADDRESS is not a valid address")?;

        let treasury_private_key =
            std::env::var("TREASURY_PRIVATE_KEY").context("TREASURY_PRIVATE_KEY must be set")?;

        Ok(Self {
            mnemonic,
            treasury_address,
            treasury_private_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = WalletCredentials {
            mnemonic: "abandon abandon about".into(),
            treasury_address: Address::zero(),
            treasury_private_key: "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                .into(),
        };
        let out = format!("{:?}", creds);
        assert!(!out.contains("abandon"));
        assert!(!out.contains("4c0883a"));
        assert!(out.contains("<redacted>"));
    }
}
