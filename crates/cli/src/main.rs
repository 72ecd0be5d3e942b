//! # BlockLander CLI
//!
//! 稼働中のGatewayに対してミントフローを実行する。
//!
//! - `sign-proof` — 所有権証明（`userSignature`）を生成
//! - `info` — 認可者情報を表示
//! - `verify` — 資格確認を行い、資格があれば `mintWithSignature` のcalldataを出力
//! - `domain-separator` — ドメインセパレータを計算

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use blocklander_client::api::domain_separator_of;
use blocklander_client::workflow::{BASE_CHAIN_ID, DEFAULT_EXPLORER_URL};
use blocklander_client::{
    FlowEvent, FlowState, LocalWallet, MintAuthorization, MintFlow, VerifyClient, VerifyOutcome,
};
use blocklander_crypto::{self as crypto, Address};
use blocklander_types::{AuthorityInfo, OwnershipPayload};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blocklander", version, about = "BlockLander ミント資格確認CLI")]
struct Args {
    /// GatewayのベースURL
    #[arg(
        long,
        global = true,
        env = "BLOCKLANDER_GATEWAY_URL",
        default_value = "http://localhost:3000"
    )]
    gateway: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 所有権証明を生成して表示する
    SignProof {
        #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        #[arg(long, default_value = "base")]
        network: String,
        #[arg(long, default_value = "blockLander")]
        project_slug: String,
    },
    /// 認可者情報を表示する
    Info,
    /// 資格確認を行い、資格があればミント用calldataを表示する
    Verify {
        #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// ウォレットが接続しているチェーン（省略時は認可者のチェーン）
        #[arg(long)]
        chain_id: Option<u64>,
        #[arg(long, default_value = DEFAULT_EXPLORER_URL)]
        explorer: String,
        /// LookupFailed時の再試行回数
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// ドメインセパレータを計算する
    DomainSeparator {
        #[arg(long, default_value = "blockLander")]
        name: String,
        #[arg(long, default_value = "1")]
        token_id: String,
        #[arg(long, default_value_t = BASE_CHAIN_ID)]
        chain_id: u64,
        #[arg(long)]
        contract: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args.command {
        Command::SignProof {
            private_key,
            network,
            project_slug,
        } => {
            let wallet = LocalWallet::from_hex(&private_key)?;
            let payload = OwnershipPayload::new(network, project_slug);
            println!("address:       {}", wallet.address().to_checksum(None));
            println!("message:       {}", payload.canonical_message());
            println!("userSignature: {}", wallet.sign_ownership(&payload));
            Ok(())
        }
        Command::Info => {
            let info = VerifyClient::new(&args.gateway)?
                .authority_info()
                .await
                .context("認可者情報の取得に失敗")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Command::Verify {
            private_key,
            chain_id,
            explorer,
            retries,
        } => {
            let wallet = LocalWallet::from_hex(&private_key)?;
            run_verify(&args.gateway, &wallet, chain_id, &explorer, retries).await
        }
        Command::DomainSeparator {
            name,
            token_id,
            chain_id,
            contract,
        } => {
            let contract = Address::from_str(&contract)
                .map_err(|e| anyhow!("コントラクトアドレスが不正です: {e}"))?;
            let separator = crypto::domain_separator(&name, &token_id, chain_id, contract);
            println!("{}", crypto::to_hex(separator.as_slice()));
            Ok(())
        }
    }
}

/// 状態機械に従って接続から資格確認までを進める。
async fn run_verify(
    gateway: &str,
    wallet: &LocalWallet,
    chain_id: Option<u64>,
    explorer: &str,
    retries: u32,
) -> Result<()> {
    let client = VerifyClient::new(gateway)?;
    let info = client
        .authority_info()
        .await
        .context("認可者情報の取得に失敗")?;
    let payload = OwnershipPayload::new(info.network.clone(), info.project_slug.clone());

    let mut flow = MintFlow::new(info.chain_id).with_explorer(explorer);
    flow.apply(FlowEvent::WalletConnected {
        address: wallet.address(),
        chain_id: chain_id.unwrap_or(info.chain_id),
    })?;

    let mut attempts = 0u32;
    let mut rejection = None;
    loop {
        match flow.state().clone() {
            FlowState::WrongNetwork { chain_id, .. } => {
                bail!(
                    "chain id {chain_id} は未対応です。chain id {} に切り替えてください",
                    info.chain_id
                );
            }
            FlowState::Unsigned { .. } => {
                if let Some(message) = rejection.take() {
                    bail!("Gatewayが所有権証明を拒否しました: {message}");
                }
                flow.apply(FlowEvent::MessageSigned {
                    proof: wallet.sign_ownership(&payload),
                })?;
            }
            FlowState::AwaitingEligibility { address, proof } => {
                let outcome = client.verify(address, &proof).await;
                if let VerifyOutcome::Rejected { message, .. } = &outcome {
                    rejection = Some(message.clone());
                }
                flow.apply(FlowEvent::VerificationFinished(outcome))?;
            }
            FlowState::LookupUnavailable { reason, .. } => {
                if attempts >= retries {
                    bail!("資格確認に失敗しました。時間をおいて再試行してください: {reason}");
                }
                attempts += 1;
                let delay = Duration::from_secs(1 << attempts.min(5));
                tracing::warn!(attempt = attempts, ?delay, %reason, "資格確認を再試行します");
                tokio::time::sleep(delay).await;
                flow.apply(FlowEvent::RetryRequested)?;
            }
            FlowState::Ineligible { address } => {
                println!(
                    "{} はブロックを提案したバリデータの出金先ではないため、ミントできません",
                    address.to_checksum(None)
                );
                return Ok(());
            }
            FlowState::Mintable { authorization, .. } => {
                check_signer(&info, &authorization)?;
                print_mint_call(&info, &authorization)?;
                return Ok(());
            }
            other => bail!("想定外の状態です: {}", other.name()),
        }
    }
}

/// 認可署名が公開された署名者に復元されることを確認する。
fn check_signer(info: &AuthorityInfo, authorization: &MintAuthorization) -> Result<()> {
    let separator = domain_separator_of(info)?;
    let expected = Address::from_str(&info.signer_address)
        .map_err(|e| anyhow!("signerAddressが不正です: {e}"))?;
    let recovered = authorization.recover_signer(&separator)?;
    if recovered != expected {
        bail!("認可署名の署名者 {recovered} が認可者 {expected} と一致しません");
    }
    Ok(())
}

fn print_mint_call(info: &AuthorityInfo, authorization: &MintAuthorization) -> Result<()> {
    let signature = &authorization.signature;
    let call = serde_json::json!({
        "to": info.contract_address,
        "chainId": info.chain_id,
        "function": "mintWithSignature(address,uint256,uint8,bytes32,bytes32)",
        "args": {
            "minter": authorization.minter.to_checksum(None),
            "validatorIndex": authorization.validator_index,
            "v": signature.v,
            "r": crypto::to_hex(signature.r.as_slice()),
            "s": crypto::to_hex(signature.s.as_slice()),
        },
        "data": crypto::to_hex(&authorization.calldata()),
    });
    println!("{}", serde_json::to_string_pretty(&call)?);
    Ok(())
}
