//! # 資格オラクル (Eligibility Oracle)
//!
//! ウォレットアドレスを出金先とするバリデータを外部チェーンデータAPIで検索し、
//! そのバリデータのブロック提案履歴を取得する。
//!
//! 呼び出しは2段階で、2段目は1段目の結果に依存するため逐次実行する。
//! 1. 出金先アドレス → validatorIndex
//! 2. validatorIndex → 提案した実行レイヤーブロック
//!
//! 外部APIの失敗は `OracleError::LookupFailed` として返し、「該当なし」とは区別する。

pub mod beaconchain;

use std::str::FromStr;

use blocklander_crypto::Address;
use blocklander_types::{ProducedBlock, WithdrawalValidator};

/// オラクルのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// 通信失敗・タイムアウト・非OKステータス・パース失敗
    #[error("チェーンデータの取得に失敗: {0}")]
    LookupFailed(String),
}

/// チェーンデータAPIの抽象インターフェース。
///
/// 本番は beaconcha.in、テストはメモリ内のモックを使用する。
#[async_trait::async_trait]
pub trait ChainDataSource: Send + Sync {
    /// 出金先アドレスに紐づくバリデータを返す（APIの返却順）。
    async fn validators_by_withdrawal_address(
        &self,
        address: Address,
    ) -> Result<Vec<WithdrawalValidator>, OracleError>;

    /// バリデータが提案した実行レイヤーブロックを新しい順に返す。
    async fn produced_blocks(&self, validator_index: u64)
        -> Result<Vec<ProducedBlock>, OracleError>;
}

/// 複数のバリデータが同じ出金先を共有する場合の選択方針。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidatorSelection {
    /// APIが最初に返したバリデータを使用する
    #[default]
    First,
    /// 返却順に確認し、最初に提案履歴を持つバリデータを使用する
    FirstProposer,
}

/// 未知の選択方針名。
#[derive(Debug, thiserror::Error)]
#[error("未知のVALIDATOR_SELECTIONです: {0}（first / first-proposer）")]
pub struct UnknownSelection(String);

impl FromStr for ValidatorSelection {
    type Err = UnknownSelection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first" => Ok(ValidatorSelection::First),
            "first-proposer" => Ok(ValidatorSelection::FirstProposer),
            other => Err(UnknownSelection(other.to_string())),
        }
    }
}

/// 検索で見つかったバリデータと提案履歴。
#[derive(Debug, Clone)]
pub struct ValidatorRecord {
    pub validator_index: u64,
    pub produced_blocks: Vec<ProducedBlock>,
}

impl ValidatorRecord {
    /// 1ブロック以上提案しているか。
    pub fn has_proposed(&self) -> bool {
        !self.produced_blocks.is_empty()
    }
}

/// 検索結果。
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(ValidatorRecord),
    /// 出金先として登録されたバリデータがない
    NotFound,
}

/// 資格オラクル。
pub struct EligibilityOracle {
    source: Box<dyn ChainDataSource>,
    selection: ValidatorSelection,
}

impl EligibilityOracle {
    pub fn new(source: Box<dyn ChainDataSource>, selection: ValidatorSelection) -> Self {
        Self { source, selection }
    }

    pub fn selection(&self) -> ValidatorSelection {
        self.selection
    }

    /// アドレスに対応するバリデータと提案履歴を検索する。
    ///
    /// 提案履歴が空のバリデータも `Found` として返す。資格判定は呼び出し側で行う。
    pub async fn lookup(&self, address: Address) -> Result<Lookup, OracleError> {
        let validators = self.source.validators_by_withdrawal_address(address).await?;
        let Some(first) = validators.first() else {
            tracing::debug!(%address, "出金先に紐づくバリデータなし");
            return Ok(Lookup::NotFound);
        };

        if validators.len() > 1 {
            tracing::info!(
                %address,
                count = validators.len(),
                selection = ?self.selection,
                "複数のバリデータが同じ出金先を共有"
            );
        }

        match self.selection {
            ValidatorSelection::First => {
                let produced_blocks = self.source.produced_blocks(first.validatorindex).await?;
                Ok(Lookup::Found(ValidatorRecord {
                    validator_index: first.validatorindex,
                    produced_blocks,
                }))
            }
            ValidatorSelection::FirstProposer => {
                let mut fallback = None;
                for validator in &validators {
                    let produced_blocks =
                        self.source.produced_blocks(validator.validatorindex).await?;
                    let record = ValidatorRecord {
                        validator_index: validator.validatorindex,
                        produced_blocks,
                    };
                    if record.has_proposed() {
                        return Ok(Lookup::Found(record));
                    }
                    fallback.get_or_insert(record);
                }
                Ok(fallback.map_or(Lookup::NotFound, Lookup::Found))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// テスト用のメモリ内チェーンデータ。
    #[derive(Default)]
    struct MockSource {
        validators: Vec<u64>,
        produced: HashMap<u64, usize>,
        fail_blocks: bool,
    }

    fn block(n: u64) -> ProducedBlock {
        ProducedBlock {
            block_hash: format!("0x{n:064x}"),
            block_number: n,
            timestamp: 1_700_000_000 + n,
            fee_recipient: None,
            tx_count: None,
            pos_consensus: None,
        }
    }

    #[async_trait::async_trait]
    impl ChainDataSource for MockSource {
        async fn validators_by_withdrawal_address(
            &self,
            _address: Address,
        ) -> Result<Vec<WithdrawalValidator>, OracleError> {
            Ok(self
                .validators
                .iter()
                .map(|i| WithdrawalValidator {
                    publickey: format!("0x{i:096x}"),
                    validatorindex: *i,
                })
                .collect())
        }

        async fn produced_blocks(
            &self,
            validator_index: u64,
        ) -> Result<Vec<ProducedBlock>, OracleError> {
            if self.fail_blocks {
                return Err(OracleError::LookupFailed("HTTP 500".into()));
            }
            let count = self.produced.get(&validator_index).copied().unwrap_or(0);
            Ok((0..count as u64).map(block).collect())
        }
    }

    #[tokio::test]
    async fn test_no_validator_is_not_found() {
        let oracle = EligibilityOracle::new(Box::new(MockSource::default()), ValidatorSelection::First);
        assert!(matches!(oracle.lookup(Address::ZERO).await.unwrap(), Lookup::NotFound));
    }

    #[tokio::test]
    async fn test_first_selection_uses_first_index() {
        let source = MockSource {
            validators: vec![5, 9],
            produced: HashMap::from([(9, 2)]),
            ..Default::default()
        };
        let oracle = EligibilityOracle::new(Box::new(source), ValidatorSelection::First);
        let Lookup::Found(record) = oracle.lookup(Address::ZERO).await.unwrap() else {
            panic!("expected Found");
        };
        assert_eq!(record.validator_index, 5);
        assert!(!record.has_proposed());
    }

    #[tokio::test]
    async fn test_first_proposer_selection() {
        let source = MockSource {
            validators: vec![5, 9, 12],
            produced: HashMap::from([(9, 2), (12, 4)]),
            ..Default::default()
        };
        let oracle = EligibilityOracle::new(Box::new(source), ValidatorSelection::FirstProposer);
        let Lookup::Found(record) = oracle.lookup(Address::ZERO).await.unwrap() else {
            panic!("expected Found");
        };
        assert_eq!(record.validator_index, 9);
        assert_eq!(record.produced_blocks.len(), 2);
    }

    /// 誰も提案していない場合は最初のバリデータを空履歴で返す
    #[tokio::test]
    async fn test_first_proposer_falls_back_to_first() {
        let source = MockSource {
            validators: vec![5, 9],
            ..Default::default()
        };
        let oracle = EligibilityOracle::new(Box::new(source), ValidatorSelection::FirstProposer);
        let Lookup::Found(record) = oracle.lookup(Address::ZERO).await.unwrap() else {
            panic!("expected Found");
        };
        assert_eq!(record.validator_index, 5);
        assert!(!record.has_proposed());
    }

    #[tokio::test]
    async fn test_second_stage_failure_is_lookup_failed() {
        let source = MockSource {
            validators: vec![42],
            fail_blocks: true,
            ..Default::default()
        };
        let oracle = EligibilityOracle::new(Box::new(source), ValidatorSelection::First);
        let result = oracle.lookup(Address::ZERO).await;
        assert!(matches!(result, Err(OracleError::LookupFailed(_))));
    }

    #[test]
    fn test_selection_from_str() {
        assert_eq!("first".parse::<ValidatorSelection>().unwrap(), ValidatorSelection::First);
        assert_eq!(
            " first-proposer ".parse::<ValidatorSelection>().unwrap(),
            ValidatorSelection::FirstProposer
        );
        assert!("lowest".parse::<ValidatorSelection>().is_err());
    }
}
