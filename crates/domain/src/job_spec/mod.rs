//! 作业规格生成
//!
//! 根据作业类型、算法与各方数据，生成执行引擎所需的 conf（参数）与 dsl（组件流水线）。
//! 纯函数，无状态、无 I/O。各方在规格中的顺序严格按调用方给出的列表，
//! 调用方必须从作业的规范 host 列表得到该顺序，而不是遍历任何映射。

mod conf;
mod dsl;

use portal_errors::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};

use crate::entities::{AlgorithmType, JobType};

/// 参与方在规格中的数据引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub party_id: u64,
    pub table_name: String,
    pub table_namespace: String,
    #[serde(default)]
    pub label_name: String,
}

/// 预测作业引用的已训练模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub model_id: String,
    pub model_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmOptions {
    #[serde(default)]
    pub validation_enabled: bool,
    /// 验证集比例（百分比，1..=99）
    #[serde(default)]
    pub validation_size_percent: u32,
    #[serde(default)]
    pub predicting_model: Option<ModelRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub conf: String,
    pub dsl: String,
}

/// 规格生成计划：校验后的作业形态
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pipeline {
    Training {
        algorithm: AlgorithmType,
        validate_size: Option<f64>,
    },
    Predicting {
        algorithm: AlgorithmType,
        model: ModelRef,
    },
    Psi,
}

impl Pipeline {
    pub(crate) fn algorithm(&self) -> Option<AlgorithmType> {
        match self {
            Pipeline::Training { algorithm, .. } | Pipeline::Predicting { algorithm, .. } => {
                Some(*algorithm)
            }
            Pipeline::Psi => None,
        }
    }

    /// 流水线中是否包含求交组件
    pub(crate) fn has_intersection(&self) -> bool {
        match self.algorithm() {
            Some(algorithm) => !algorithm.is_homo(),
            None => true,
        }
    }

    pub(crate) fn has_arbiter(&self) -> bool {
        match self {
            Pipeline::Training { algorithm, .. } => algorithm.needs_arbiter(),
            Pipeline::Predicting { algorithm, .. } => *algorithm == AlgorithmType::HeteroLr,
            Pipeline::Psi => false,
        }
    }
}

/// 生成作业规格。
///
/// `others` 为除发起方（guest）外的参与方，按规范 host 顺序排列。
pub fn generate_job_spec(
    job_type: JobType,
    algorithm: Option<AlgorithmType>,
    initiator: &PartyInfo,
    others: &[PartyInfo],
    options: &AlgorithmOptions,
) -> PortalResult<JobSpec> {
    let pipeline = plan(job_type, algorithm, others, options)?;
    validate_parties(initiator, others)?;

    let conf = conf::build_conf(&pipeline, initiator, others)?;
    let dsl = dsl::build_dsl(&pipeline);

    Ok(JobSpec {
        conf: serde_json::to_string(&conf)?,
        dsl: serde_json::to_string(&dsl)?,
    })
}

/// 根据 `(作业类型, 算法)` 选择模板并校验参与方数量
fn plan(
    job_type: JobType,
    algorithm: Option<AlgorithmType>,
    others: &[PartyInfo],
    options: &AlgorithmOptions,
) -> PortalResult<Pipeline> {
    let unsupported = || {
        PortalError::unsupported_algorithm(
            job_type,
            algorithm.map(|a| a.as_str()).unwrap_or("none"),
        )
    };

    match (job_type, algorithm) {
        (JobType::Psi, None) => {
            if others.is_empty() {
                return Err(PortalError::validation_error("PSI 作业至少需要两个参与方"));
            }
            Ok(Pipeline::Psi)
        }
        (JobType::Training, Some(algorithm)) => {
            if !algorithm.is_homo() && others.is_empty() {
                return Err(PortalError::validation_error(
                    "纵向算法包含求交步骤，至少需要两个参与方",
                ));
            }
            let validate_size = if options.validation_enabled {
                Some(validation_fraction(options.validation_size_percent)?)
            } else {
                None
            };
            Ok(Pipeline::Training {
                algorithm,
                validate_size,
            })
        }
        (JobType::Predicting, Some(algorithm)) => {
            if algorithm.is_homo() && !others.is_empty() {
                return Err(PortalError::validation_error(
                    "横向预测作业只能由单个参与方执行",
                ));
            }
            if !algorithm.is_homo() && others.is_empty() {
                return Err(PortalError::validation_error(
                    "纵向预测作业至少需要两个参与方",
                ));
            }
            let model = options
                .predicting_model
                .clone()
                .ok_or_else(|| PortalError::validation_error("预测作业缺少模型信息"))?;
            Ok(Pipeline::Predicting { algorithm, model })
        }
        _ => Err(unsupported()),
    }
}

fn validate_parties(initiator: &PartyInfo, others: &[PartyInfo]) -> PortalResult<()> {
    for party in std::iter::once(initiator).chain(others) {
        if party.table_name.trim().is_empty() || party.table_namespace.trim().is_empty() {
            return Err(PortalError::validation_error(format!(
                "参与方 {} 的数据表引用不完整",
                party.party_id
            )));
        }
    }
    Ok(())
}

/// 验证集比例保留两位小数
fn validation_fraction(percent: u32) -> PortalResult<f64> {
    if !(1..=99).contains(&percent) {
        return Err(PortalError::validation_error(format!(
            "验证集比例必须在 1 到 99 之间: {percent}"
        )));
    }
    format!("{:.2}", f64::from(percent) / 100.0)
        .parse::<f64>()
        .map_err(|e| PortalError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests;
