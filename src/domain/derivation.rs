//! 钱包派生
//!
//! 每个用户标识映射到唯一派生索引，索引映射到唯一地址/密钥对。
//! 派生是纯函数：相同种子 + 相同索引在任何进程中得到相同结果，
//! 地址从不落库，按需重算。

use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};
use sha3::{Digest, Keccak256};

use crate::error::WalletError;

/// 派生结果
#[derive(Debug, Clone)]
pub struct DerivedWallet {
    pub address: Address,
    /// 派生私钥对应的签名器（归集时作为发送方签名）
    pub signer: LocalWallet,
}

impl DerivedWallet {
    /// 0x 前缀完整十六进制地址
    pub fn address_hex(&self) -> String {
        format!("{:#x}", self.address)
    }
}

/// 地址派生器
///
/// 种子在构造时从助记词算出并固定，之后只读。
pub struct AddressDeriver {
    seed: [u8; 64],
    chain_id: u64,
}

impl AddressDeriver {
    pub fn new(mnemonic: &str, chain_id: u64) -> anyhow::Result<Self> {
        let mnemonic = Mnemonic::parse_in(Language::English, mnemonic)
            .map_err(|e| anyhow::anyhow!("Invalid mnemonic: {}", e))?;
        Ok(Self {
            seed: mnemonic.to_seed(""),
            chain_id,
        })
    }

    /// 解析用户标识为派生索引
    pub fn parse_index(user_id: &str) -> Result<u32, WalletError> {
        user_id
            .trim()
            .parse::<u32>()
            .map_err(|_| WalletError::InvalidIndex(user_id.to_string()))
    }

    /// 派生路径 m/44'/60'/0'/0/{index} 上的钱包
    pub fn derive(&self, index: u32) -> Result<DerivedWallet, WalletError> {
        use coins_bip32::prelude::*;

        let path = format!("m/44'/60'/0'/0/{}", index);
        let derivation_path = path
            .parse::<DerivationPath>()
            .map_err(|e| WalletError::Internal(format!("Invalid derivation path: {}", e)))?;

        let master_key = XPriv::root_from_seed(&self.seed, None)
            .map_err(|e| WalletError::Internal(format!("Failed to derive master key: {}", e)))?;

        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| WalletError::Internal(format!("Failed to derive key: {}", e)))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        let private_key_bytes = signing_key.to_bytes();

        let verifying_key = signing_key.verifying_key();
        let public_key_bytes = verifying_key.to_encoded_point(false); // 未压缩格式
        let public_key_slice = &public_key_bytes.as_bytes()[1..]; // 去掉 0x04 前缀

        // Keccak256 哈希，取后 20 字节
        let hash = Keccak256::digest(public_key_slice);
        let address = Address::from_slice(&hash[12..]);

        let signer = LocalWallet::from_bytes(&private_key_bytes)
            .map_err(|e| WalletError::Internal(format!("Failed to build signer: {}", e)))?
            .with_chain_id(self.chain_id);

        Ok(DerivedWallet { address, signer })
    }

    /// 解析用户标识并派生（API 层入口）
    pub fn derive_for_user(&self, user_id: &str) -> Result<DerivedWallet, WalletError> {
        self.derive(Self::parse_index(user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(TEST_MNEMONIC, 56).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let d = deriver();
        let a = d.derive(7).unwrap();
        let b = d.derive(7).unwrap();
        assert_eq!(a.address, b.address);

        // 新实例（同种子）得到同样地址
        let other = deriver();
        assert_eq!(other.derive(7).unwrap().address, a.address);
    }

    #[test]
    fn test_distinct_indices_distinct_addresses() {
        let d = deriver();
        let addrs: Vec<_> = (0..16).map(|i| d.derive(i).unwrap().address).collect();
        for i in 0..addrs.len() {
            for j in (i + 1)..addrs.len() {
                assert_ne!(addrs[i], addrs[j]);
            }
        }
    }

    #[test]
    fn test_known_bip44_vector() {
        // m/44'/60'/0'/0/0 标准测试向量
        let d = deriver();
        let wallet = d.derive(0).unwrap();
        assert_eq!(
            wallet.address_hex(),
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        );
    }

    #[test]
    fn test_invalid_index_rejected() {
        assert!(matches!(
            AddressDeriver::parse_index("not-a-number"),
            Err(WalletError::InvalidIndex(_))
        ));
        assert!(matches!(
            AddressDeriver::parse_index("-3"),
            Err(WalletError::InvalidIndex(_))
        ));
        assert_eq!(AddressDeriver::parse_index(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_signer_matches_address() {
        use ethers::signers::Signer;
        let d = deriver();
        let wallet = d.derive(3).unwrap();
        assert_eq!(wallet.signer.address(), wallet.address);
    }
}
