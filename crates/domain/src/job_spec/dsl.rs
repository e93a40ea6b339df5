use serde_json::{json, Map, Value};

use super::{conf::split_component_name, Pipeline};

/// 组件流水线：reader_0 → data_transform_0 → [intersection_0] → [数据切分] → 算法组件 → [evaluation_0]
pub(super) fn build_dsl(pipeline: &Pipeline) -> Value {
    let mut components = Map::new();
    components.insert(
        "reader_0".to_string(),
        json!({
            "module": "Reader",
            "output": { "data": ["data"] }
        }),
    );

    let predicting = matches!(pipeline, Pipeline::Predicting { .. });
    let mut data_transform = json!({
        "module": "DataTransform",
        "input": { "data": { "data": ["reader_0.data"] } },
        "output": { "data": ["data"], "model": ["model"] }
    });
    if predicting {
        data_transform["input"]["model"] = json!(["pipeline.data_transform_0.model"]);
    }
    components.insert("data_transform_0".to_string(), data_transform);
    let mut upstream = "data_transform_0.data".to_string();

    if pipeline.has_intersection() {
        components.insert(
            "intersection_0".to_string(),
            json!({
                "module": "Intersection",
                "input": { "data": { "data": [upstream] } },
                "output": { "data": ["data"], "cache": ["cache"] }
            }),
        );
        upstream = "intersection_0.data".to_string();
    }

    match pipeline {
        Pipeline::Psi => {}
        Pipeline::Training {
            algorithm,
            validate_size,
        } => {
            let component = algorithm.component_name();
            let train_input = if validate_size.is_some() {
                let split = split_component_name(*algorithm);
                components.insert(
                    split.to_string(),
                    json!({
                        "module": if algorithm.is_homo() { "HomoDataSplit" } else { "HeteroDataSplit" },
                        "input": { "data": { "data": [upstream] } },
                        "output": { "data": ["train_data", "validate_data", "test_data"] }
                    }),
                );
                json!({
                    "train_data": [format!("{split}.train_data")],
                    "validate_data": [format!("{split}.validate_data")],
                })
            } else {
                json!({ "train_data": [upstream] })
            };
            components.insert(
                component.clone(),
                json!({
                    "module": algorithm.module_name(),
                    "input": { "data": train_input },
                    "output": { "data": ["data"], "model": ["model"] }
                }),
            );
            components.insert(
                "evaluation_0".to_string(),
                json!({
                    "module": "Evaluation",
                    "input": { "data": { "data": [format!("{component}.data")] } },
                    "output": { "data": ["data"] }
                }),
            );
        }
        Pipeline::Predicting { algorithm, .. } => {
            let component = algorithm.component_name();
            components.insert(
                component.clone(),
                json!({
                    "module": algorithm.module_name(),
                    "input": {
                        "data": { "test_data": [upstream] },
                        "model": [format!("pipeline.{component}.model")]
                    },
                    "output": { "data": ["data"] }
                }),
            );
        }
    }

    json!({ "components": components })
}
