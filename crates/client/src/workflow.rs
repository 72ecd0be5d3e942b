//! # ミントフロー状態機械
//!
//! ウォレット接続 → ネットワーク確認 → 所有権証明の署名 → 資格確認 →
//! ミントトランザクション送信 → 確認 の流れを状態として管理する。
//!
//! 各状態は最大1つの主要アクションを持つ。切断は接続済みの全状態から可能。
//! 現在の状態で受け付けないイベントは [`FlowError::InvalidTransition`] となり、
//! 状態は変化しない。

use blocklander_crypto::{self as crypto, Address, B256};

use crate::api::VerifyOutcome;
use crate::mint::MintAuthorization;

/// Base mainnet
pub const BASE_CHAIN_ID: u64 = 8453;
/// トランザクション確認用のブロックエクスプローラー
pub const DEFAULT_EXPLORER_URL: &str = "https://basescan.org";

/// フローの状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Disconnected,
    /// 接続済みだが未対応のチェーン。認可や送信済みトランザクションは `held` に保持し、
    /// 対応チェーンに戻ったときに復元する
    WrongNetwork {
        address: Address,
        chain_id: u64,
        held: Option<Box<FlowState>>,
    },
    /// 所有権証明が未署名
    Unsigned { address: Address },
    /// 資格確認中
    AwaitingEligibility { address: Address, proof: String },
    /// 資格なし。アドレスが変わるまで終端
    Ineligible { address: Address },
    /// 資格確認に失敗（再試行可能）
    LookupUnavailable {
        address: Address,
        proof: String,
        reason: String,
    },
    Mintable {
        address: Address,
        authorization: MintAuthorization,
    },
    /// トランザクション送信済み、レシート待ち
    Pending {
        address: Address,
        authorization: MintAuthorization,
        tx_hash: B256,
    },
    Confirmed { address: Address, tx_hash: B256 },
    /// 失敗。自動再試行はしないが、認可を保持して手動の再ミントを許す
    Failed {
        address: Address,
        authorization: MintAuthorization,
        tx_hash: Option<B256>,
        reason: String,
    },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Disconnected => "Disconnected",
            FlowState::WrongNetwork { .. } => "WrongNetwork",
            FlowState::Unsigned { .. } => "Unsigned",
            FlowState::AwaitingEligibility { .. } => "AwaitingEligibility",
            FlowState::Ineligible { .. } => "Ineligible",
            FlowState::LookupUnavailable { .. } => "LookupUnavailable",
            FlowState::Mintable { .. } => "Mintable",
            FlowState::Pending { .. } => "Pending",
            FlowState::Confirmed { .. } => "Confirmed",
            FlowState::Failed { .. } => "Failed",
        }
    }

    /// 未対応チェーンへの移動をまたいで保持する状態か。
    fn survives_network_detour(&self) -> bool {
        matches!(
            self,
            FlowState::Mintable { .. }
                | FlowState::Pending { .. }
                | FlowState::Confirmed { .. }
                | FlowState::Failed { .. }
        )
    }

    /// 接続中のアドレス。
    pub fn address(&self) -> Option<Address> {
        match self {
            FlowState::Disconnected => None,
            FlowState::WrongNetwork { address, .. }
            | FlowState::Unsigned { address }
            | FlowState::AwaitingEligibility { address, .. }
            | FlowState::Ineligible { address }
            | FlowState::LookupUnavailable { address, .. }
            | FlowState::Mintable { address, .. }
            | FlowState::Pending { address, .. }
            | FlowState::Confirmed { address, .. }
            | FlowState::Failed { address, .. } => Some(*address),
        }
    }
}

/// 状態ごとの主要アクション。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ConnectWallet,
    SwitchNetwork { chain_id: u64 },
    SignMessage,
    RetryVerification,
    Mint,
    ViewTransaction { url: String },
}

/// 状態機械への入力。
#[derive(Debug, Clone)]
pub enum FlowEvent {
    WalletConnected { address: Address, chain_id: u64 },
    /// ネットワーク切替の成功もこのイベントで通知する
    ChainChanged { chain_id: u64 },
    AccountChanged { address: Address },
    MessageSigned { proof: String },
    /// 署名ダイアログが閉じられた
    SignDismissed,
    VerificationFinished(VerifyOutcome),
    RetryRequested,
    MintSubmitted { tx_hash: B256 },
    TransactionConfirmed,
    TransactionFailed { reason: String },
    Disconnected,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::WalletConnected { .. } => "WalletConnected",
            FlowEvent::ChainChanged { .. } => "ChainChanged",
            FlowEvent::AccountChanged { .. } => "AccountChanged",
            FlowEvent::MessageSigned { .. } => "MessageSigned",
            FlowEvent::SignDismissed => "SignDismissed",
            FlowEvent::VerificationFinished(_) => "VerificationFinished",
            FlowEvent::RetryRequested => "RetryRequested",
            FlowEvent::MintSubmitted { .. } => "MintSubmitted",
            FlowEvent::TransactionConfirmed => "TransactionConfirmed",
            FlowEvent::TransactionFailed { .. } => "TransactionFailed",
            FlowEvent::Disconnected => "Disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("{state} ではイベント {event} を受け付けません")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    /// 認可のミンターが接続中のアドレスと異なる
    #[error("認可のミンター {authorized} が接続中のアドレス {connected} と一致しません")]
    MinterMismatch {
        authorized: Address,
        connected: Address,
    },
}

/// ミントフロー。
#[derive(Debug, Clone)]
pub struct MintFlow {
    state: FlowState,
    chain_id: Option<u64>,
    supported_chain_id: u64,
    explorer_url: String,
}

impl MintFlow {
    pub fn new(supported_chain_id: u64) -> Self {
        Self {
            state: FlowState::Disconnected,
            chain_id: None,
            supported_chain_id,
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        }
    }

    pub fn with_explorer(mut self, explorer_url: impl Into<String>) -> Self {
        self.explorer_url = explorer_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn explorer_link(&self, tx_hash: &B256) -> String {
        format!("{}/tx/{}", self.explorer_url, crypto::to_hex(tx_hash.as_slice()))
    }

    /// 現在の状態で提示する主要アクション。
    pub fn primary_action(&self) -> Option<Action> {
        match &self.state {
            FlowState::Disconnected => Some(Action::ConnectWallet),
            FlowState::WrongNetwork { .. } => Some(Action::SwitchNetwork {
                chain_id: self.supported_chain_id,
            }),
            FlowState::Unsigned { .. } => Some(Action::SignMessage),
            FlowState::LookupUnavailable { .. } => Some(Action::RetryVerification),
            FlowState::Mintable { .. } | FlowState::Failed { .. } => Some(Action::Mint),
            FlowState::Confirmed { tx_hash, .. } => Some(Action::ViewTransaction {
                url: self.explorer_link(tx_hash),
            }),
            FlowState::AwaitingEligibility { .. }
            | FlowState::Ineligible { .. }
            | FlowState::Pending { .. } => None,
        }
    }

    /// 切断アクションを提示するか。
    pub fn can_disconnect(&self) -> bool {
        self.state.address().is_some()
    }

    /// イベントを適用する。失敗した場合は状態を変更しない。
    pub fn apply(&mut self, event: FlowEvent) -> Result<&FlowState, FlowError> {
        let (next, chain_id) = self.transition(event)?;
        tracing::debug!(from = self.state.name(), to = next.name(), "状態遷移");
        self.state = next;
        self.chain_id = chain_id;
        Ok(&self.state)
    }

    fn connected(&self, address: Address, chain_id: u64) -> FlowState {
        if chain_id == self.supported_chain_id {
            FlowState::Unsigned { address }
        } else {
            FlowState::WrongNetwork {
                address,
                chain_id,
                held: None,
            }
        }
    }

    fn transition(&self, event: FlowEvent) -> Result<(FlowState, Option<u64>), FlowError> {
        let invalid = FlowError::InvalidTransition {
            state: self.state.name(),
            event: event.name(),
        };
        let chain_id = self.chain_id;

        let next = match (&self.state, event) {
            (FlowState::Disconnected, FlowEvent::WalletConnected { address, chain_id }) => {
                return Ok((self.connected(address, chain_id), Some(chain_id)));
            }
            (state, FlowEvent::Disconnected) if state.address().is_some() => {
                return Ok((FlowState::Disconnected, None));
            }
            (state, FlowEvent::AccountChanged { address }) if state.address() == Some(address) => {
                state.clone()
            }
            (state, FlowEvent::AccountChanged { address }) if state.address().is_some() => {
                self.connected(address, chain_id.unwrap_or_default())
            }

            // チェーン変更
            (
                FlowState::WrongNetwork { address, held, .. },
                FlowEvent::ChainChanged { chain_id },
            ) => {
                let next = if chain_id == self.supported_chain_id {
                    match held {
                        Some(held) => (**held).clone(),
                        None => FlowState::Unsigned { address: *address },
                    }
                } else {
                    FlowState::WrongNetwork {
                        address: *address,
                        chain_id,
                        held: held.clone(),
                    }
                };
                return Ok((next, Some(chain_id)));
            }
            (state, FlowEvent::ChainChanged { chain_id }) => match state.address() {
                Some(address) if chain_id != self.supported_chain_id => {
                    let held = state
                        .survives_network_detour()
                        .then(|| Box::new(state.clone()));
                    return Ok((
                        FlowState::WrongNetwork {
                            address,
                            chain_id,
                            held,
                        },
                        Some(chain_id),
                    ));
                }
                Some(_) => return Ok((state.clone(), Some(chain_id))),
                None => return Err(invalid),
            },

            // 所有権証明
            (FlowState::Unsigned { address }, FlowEvent::MessageSigned { proof }) => {
                FlowState::AwaitingEligibility {
                    address: *address,
                    proof,
                }
            }
            (FlowState::Unsigned { address }, FlowEvent::SignDismissed) => {
                FlowState::Unsigned { address: *address }
            }

            // 資格確認
            (
                FlowState::AwaitingEligibility { address, proof },
                FlowEvent::VerificationFinished(outcome),
            ) => {
                let address = *address;
                match outcome {
                    VerifyOutcome::Eligible(authorization) => {
                        if authorization.minter != address {
                            return Err(FlowError::MinterMismatch {
                                authorized: authorization.minter,
                                connected: address,
                            });
                        }
                        FlowState::Mintable {
                            address,
                            authorization,
                        }
                    }
                    VerifyOutcome::Ineligible => FlowState::Ineligible { address },
                    VerifyOutcome::LookupFailed(reason) => FlowState::LookupUnavailable {
                        address,
                        proof: proof.clone(),
                        reason,
                    },
                    VerifyOutcome::Rejected { .. } => FlowState::Unsigned { address },
                }
            }
            (FlowState::LookupUnavailable { address, proof, .. }, FlowEvent::RetryRequested) => {
                FlowState::AwaitingEligibility {
                    address: *address,
                    proof: proof.clone(),
                }
            }

            // 未対応チェーン上でも送信済みトランザクションのレシートは追跡する
            (
                FlowState::WrongNetwork {
                    address,
                    chain_id: current,
                    held: Some(held),
                },
                event @ (FlowEvent::TransactionConfirmed | FlowEvent::TransactionFailed { .. }),
            ) if matches!(**held, FlowState::Pending { .. }) => {
                let pending = MintFlow {
                    state: (**held).clone(),
                    ..self.clone()
                };
                let (resolved, _) = pending.transition(event)?;
                FlowState::WrongNetwork {
                    address: *address,
                    chain_id: *current,
                    held: Some(Box::new(resolved)),
                }
            }

            // ミント
            (
                FlowState::Mintable {
                    address,
                    authorization,
                }
                | FlowState::Failed {
                    address,
                    authorization,
                    ..
                },
                FlowEvent::MintSubmitted { tx_hash },
            ) => FlowState::Pending {
                address: *address,
                authorization: authorization.clone(),
                tx_hash,
            },
            (FlowState::Pending { address, tx_hash, .. }, FlowEvent::TransactionConfirmed) => {
                FlowState::Confirmed {
                    address: *address,
                    tx_hash: *tx_hash,
                }
            }
            (
                FlowState::Pending {
                    address,
                    authorization,
                    tx_hash,
                },
                FlowEvent::TransactionFailed { reason },
            ) => FlowState::Failed {
                address: *address,
                authorization: authorization.clone(),
                tx_hash: Some(*tx_hash),
                reason,
            },
            // 送信前の失敗（ユーザーによる拒否等）
            (
                FlowState::Mintable {
                    address,
                    authorization,
                },
                FlowEvent::TransactionFailed { reason },
            ) => FlowState::Failed {
                address: *address,
                authorization: authorization.clone(),
                tx_hash: None,
                reason,
            },

            _ => return Err(invalid),
        };

        Ok((next, chain_id))
    }
}
