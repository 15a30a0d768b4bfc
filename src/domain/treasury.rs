//! 国库上下文
//!
//! 进程内唯一的中心钱包：启动时从凭据构造一次，之后只读。

use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};

use crate::infrastructure::credentials::WalletCredentials;

#[derive(Clone)]
pub struct TreasuryContext {
    pub address: Address,
    pub signer: LocalWallet,
}

impl TreasuryContext {
    pub fn new(credentials: &WalletCredentials, chain_id: u64) -> anyhow::Result<Self> {
        let signer: LocalWallet = credentials
            .treasury_private_key
            .parse::<LocalWallet>()
            .map_err(|e| anyhow::anyhow!("TREASURY_PRIVATE_KEY is not a valid key: {}", e))?
            .with_chain_id(chain_id);

        // 私钥和地址不匹配说明凭据配置错了，启动即失败
        anyhow::ensure!(
            signer.address() == credentials.treasury_address,
            "treasury private key does not match treasury address"
        );

        Ok(Self {
            address: credentials.treasury_address,
            signer,
        })
    }

    pub fn address_hex(&self) -> String {
        format!("{:#x}", self.address)
    }
}
