use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{PartyInfo, Pipeline};
use crate::entities::AlgorithmType;

const DEFAULT_LABEL_NAME: &str = "y";

#[derive(Debug, Serialize)]
struct JobConf {
    dsl_version: u8,
    initiator: Initiator,
    role: RoleSpec,
    job_parameters: Value,
    component_parameters: Value,
}

#[derive(Debug, Serialize)]
struct Initiator {
    role: &'static str,
    party_id: u64,
}

/// 字段顺序即输出顺序：guest、host、arbiter
#[derive(Debug, Serialize)]
struct RoleSpec {
    guest: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    host: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arbiter: Option<Vec<String>>,
}

pub(super) fn build_conf(
    pipeline: &Pipeline,
    initiator: &PartyInfo,
    others: &[PartyInfo],
) -> serde_json::Result<Value> {
    let host: Vec<String> = others.iter().map(|p| p.party_id.to_string()).collect();
    // arbiter 默认取第一个 host，没有 host 时取 guest
    let arbiter = pipeline.has_arbiter().then(|| {
        vec![others
            .first()
            .map(|p| p.party_id)
            .unwrap_or(initiator.party_id)
            .to_string()]
    });

    let conf = JobConf {
        dsl_version: 2,
        initiator: Initiator {
            role: "guest",
            party_id: initiator.party_id,
        },
        role: RoleSpec {
            guest: vec![initiator.party_id.to_string()],
            host,
            arbiter,
        },
        job_parameters: job_parameters(pipeline),
        component_parameters: json!({
            "common": common_parameters(pipeline),
            "role": role_parameters(pipeline, initiator, others),
        }),
    };

    serde_json::to_value(conf)
}

fn job_parameters(pipeline: &Pipeline) -> Value {
    match pipeline {
        Pipeline::Predicting { model, .. } => json!({
            "common": {
                "job_type": "predict",
                "model_id": model.model_id,
                "model_version": model.model_version,
            }
        }),
        Pipeline::Training { .. } | Pipeline::Psi => json!({
            "common": {
                "job_type": "train",
                "task_parallelism": 1,
                "auto_retries": 1,
            }
        }),
    }
}

fn common_parameters(pipeline: &Pipeline) -> Value {
    let mut common = Map::new();
    if pipeline.has_intersection() {
        common.insert("intersection_0".to_string(), intersection_parameters());
    }

    if let Pipeline::Training {
        algorithm,
        validate_size,
    } = pipeline
    {
        if let Some(validate_size) = validate_size {
            common.insert(
                split_component_name(*algorithm).to_string(),
                json!({
                    "test_size": 0.0,
                    "validate_size": validate_size,
                    "stratified": true,
                }),
            );
        }
        let mut params = algorithm_parameters(*algorithm);
        if validate_size.is_some() {
            if let Value::Object(map) = &mut params {
                map.insert("validation_freqs".to_string(), json!(1));
            }
        }
        common.insert(algorithm.component_name(), params);
        common.insert("evaluation_0".to_string(), json!({ "eval_type": "binary" }));
    }

    Value::Object(common)
}

fn role_parameters(pipeline: &Pipeline, initiator: &PartyInfo, others: &[PartyInfo]) -> Value {
    let mut role = Map::new();
    role.insert(
        "guest".to_string(),
        json!({ "0": party_parameters(pipeline, initiator, true) }),
    );

    if !others.is_empty() {
        let host: Map<String, Value> = others
            .iter()
            .enumerate()
            .map(|(index, party)| (index.to_string(), party_parameters(pipeline, party, false)))
            .collect();
        role.insert("host".to_string(), Value::Object(host));
    }

    Value::Object(role)
}

fn party_parameters(pipeline: &Pipeline, party: &PartyInfo, is_guest: bool) -> Value {
    let mut components = Map::new();
    components.insert(
        "reader_0".to_string(),
        json!({
            "table": {
                "name": party.table_name,
                "namespace": party.table_namespace,
            }
        }),
    );

    // 预测作业的数据转换参数随模型加载
    let with_label = match pipeline {
        Pipeline::Predicting { .. } => None,
        Pipeline::Psi => Some(false),
        Pipeline::Training { algorithm, .. } => Some(is_guest || algorithm.is_homo()),
    };
    match with_label {
        Some(true) => {
            let label_name = if party.label_name.trim().is_empty() {
                DEFAULT_LABEL_NAME
            } else {
                party.label_name.as_str()
            };
            components.insert(
                "data_transform_0".to_string(),
                json!({
                    "with_label": true,
                    "label_name": label_name,
                    "label_type": "int",
                    "output_format": "dense",
                }),
            );
        }
        Some(false) => {
            components.insert(
                "data_transform_0".to_string(),
                json!({
                    "with_label": false,
                    "output_format": "dense",
                }),
            );
        }
        None => {}
    }

    Value::Object(components)
}

fn intersection_parameters() -> Value {
    json!({
        "intersect_method": "rsa",
        "sync_intersect_ids": true,
        "only_output_key": false,
    })
}

pub(super) fn split_component_name(algorithm: AlgorithmType) -> &'static str {
    if algorithm.is_homo() {
        "homo_data_split_0"
    } else {
        "hetero_data_split_0"
    }
}

fn algorithm_parameters(algorithm: AlgorithmType) -> Value {
    match algorithm {
        AlgorithmType::HomoLr => json!({
            "penalty": "L2",
            "tol": 1e-5,
            "alpha": 0.01,
            "optimizer": "sgd",
            "batch_size": -1,
            "learning_rate": 0.15,
            "init_param": { "init_method": "zeros" },
            "max_iter": 30,
            "early_stop": "diff",
        }),
        AlgorithmType::HomoSbt => json!({
            "task_type": "classification",
            "objective_param": { "objective": "cross_entropy" },
            "num_trees": 3,
            "tree_param": { "max_depth": 3 },
        }),
        AlgorithmType::HeteroLr => json!({
            "penalty": "L2",
            "tol": 1e-4,
            "alpha": 0.01,
            "optimizer": "rmsprop",
            "batch_size": -1,
            "learning_rate": 0.15,
            "init_param": { "init_method": "zeros" },
            "max_iter": 30,
            "early_stop": "diff",
        }),
        AlgorithmType::HeteroSbt => json!({
            "task_type": "classification",
            "objective_param": { "objective": "cross_entropy" },
            "num_trees": 5,
            "bin_num": 32,
            "tree_param": { "max_depth": 3 },
        }),
    }
}
