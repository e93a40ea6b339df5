use serde_json::Value;

use super::*;

fn party(party_id: u64, table: &str) -> PartyInfo {
    PartyInfo {
        party_id,
        table_name: table.to_string(),
        table_namespace: "ns".to_string(),
        label_name: String::new(),
    }
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

#[test]
fn test_homo_lr_two_party_role_section() {
    let spec = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HomoLr),
        &party(9999, "guest_tbl"),
        &[party(10000, "host_tbl")],
        &AlgorithmOptions::default(),
    )
    .unwrap();

    assert!(spec
        .conf
        .contains(r#""role":{"guest":["9999"],"host":["10000"],"arbiter":["10000"]}"#));
    assert!(!spec.dsl.is_empty());
    assert!(spec.dsl.contains("HomoLR_0"));

    let conf = parse(&spec.conf);
    assert_eq!(conf["initiator"]["party_id"], 9999);
    assert_eq!(
        conf["component_parameters"]["role"]["guest"]["0"]["reader_0"]["table"]["name"],
        "guest_tbl"
    );
    assert_eq!(
        conf["component_parameters"]["role"]["host"]["0"]["reader_0"]["table"]["name"],
        "host_tbl"
    );
    // 横向算法各方都带标签
    assert_eq!(
        conf["component_parameters"]["role"]["host"]["0"]["data_transform_0"]["with_label"],
        true
    );
}

#[test]
fn test_host_order_follows_caller_sequence() {
    let spec = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HeteroLr),
        &party(1, "g"),
        &[party(3, "h1"), party(2, "h2")],
        &AlgorithmOptions::default(),
    )
    .unwrap();

    let conf = parse(&spec.conf);
    assert_eq!(conf["role"]["host"], serde_json::json!(["3", "2"]));
    assert_eq!(conf["role"]["arbiter"], serde_json::json!(["3"]));
    assert_eq!(
        conf["component_parameters"]["role"]["host"]["0"]["reader_0"]["table"]["name"],
        "h1"
    );
    assert_eq!(
        conf["component_parameters"]["role"]["host"]["1"]["reader_0"]["table"]["name"],
        "h2"
    );
}

#[test]
fn test_single_party_homo_training_uses_guest_as_arbiter() {
    let spec = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HomoSbt),
        &party(9999, "g"),
        &[],
        &AlgorithmOptions::default(),
    )
    .unwrap();

    let conf = parse(&spec.conf);
    assert!(conf["role"].get("host").is_none());
    assert_eq!(conf["role"]["arbiter"], serde_json::json!(["9999"]));
}

#[test]
fn test_hetero_sbt_has_no_arbiter() {
    let spec = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HeteroSbt),
        &party(9999, "g"),
        &[party(10000, "h")],
        &AlgorithmOptions::default(),
    )
    .unwrap();

    let conf = parse(&spec.conf);
    assert!(conf["role"].get("arbiter").is_none());
    let dsl = parse(&spec.dsl);
    assert!(dsl["components"].get("intersection_0").is_some());
    assert_eq!(
        dsl["components"]["HeteroSecureBoost_0"]["input"]["data"]["train_data"][0],
        "intersection_0.data"
    );
    // 纵向算法只有 guest 持有标签
    assert_eq!(
        conf["component_parameters"]["role"]["host"]["0"]["data_transform_0"]["with_label"],
        false
    );
}

#[test]
fn test_validation_variant_adds_split_component() {
    let options = AlgorithmOptions {
        validation_enabled: true,
        validation_size_percent: 20,
        predicting_model: None,
    };
    let spec = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[party(10000, "h")],
        &options,
    )
    .unwrap();

    assert!(spec.conf.contains(r#""validate_size":0.2"#));
    let conf = parse(&spec.conf);
    assert_eq!(
        conf["component_parameters"]["common"]["HomoLR_0"]["validation_freqs"],
        1
    );
    let dsl = parse(&spec.dsl);
    assert_eq!(
        dsl["components"]["HomoLR_0"]["input"]["data"]["validate_data"][0],
        "homo_data_split_0.validate_data"
    );
}

#[test]
fn test_validation_percent_out_of_range() {
    let options = AlgorithmOptions {
        validation_enabled: true,
        validation_size_percent: 100,
        predicting_model: None,
    };
    let err = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[party(10000, "h")],
        &options,
    )
    .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_psi_requires_two_parties() {
    let err = generate_job_spec(
        JobType::Psi,
        None,
        &party(9999, "g"),
        &[],
        &AlgorithmOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_validation());

    let spec = generate_job_spec(
        JobType::Psi,
        None,
        &party(9999, "g"),
        &[party(10000, "h")],
        &AlgorithmOptions::default(),
    )
    .unwrap();
    let dsl = parse(&spec.dsl);
    let names: Vec<&String> = dsl["components"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["reader_0", "data_transform_0", "intersection_0"]);
}

#[test]
fn test_homo_predicting_is_single_party() {
    let options = AlgorithmOptions {
        predicting_model: Some(ModelRef {
            model_id: "guest-9999#host-10000#model".to_string(),
            model_version: "202401010000".to_string(),
        }),
        ..Default::default()
    };

    let err = generate_job_spec(
        JobType::Predicting,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[party(10000, "h")],
        &options,
    )
    .unwrap_err();
    assert!(err.is_validation());

    let spec = generate_job_spec(
        JobType::Predicting,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[],
        &options,
    )
    .unwrap();
    let conf = parse(&spec.conf);
    assert_eq!(conf["job_parameters"]["common"]["job_type"], "predict");
    assert_eq!(conf["job_parameters"]["common"]["model_version"], "202401010000");
    let dsl = parse(&spec.dsl);
    assert_eq!(
        dsl["components"]["HomoLR_0"]["input"]["model"][0],
        "pipeline.HomoLR_0.model"
    );
}

#[test]
fn test_predicting_without_model_fails() {
    let err = generate_job_spec(
        JobType::Predicting,
        Some(AlgorithmType::HeteroLr),
        &party(9999, "g"),
        &[party(10000, "h")],
        &AlgorithmOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_unsupported_combinations() {
    let err = generate_job_spec(
        JobType::Training,
        None,
        &party(9999, "g"),
        &[party(10000, "h")],
        &AlgorithmOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortalError::UnsupportedAlgorithm { .. }));

    let err = generate_job_spec(
        JobType::Psi,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[party(10000, "h")],
        &AlgorithmOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortalError::UnsupportedAlgorithm { .. }));
}

#[test]
fn test_missing_table_reference_rejected() {
    let mut host = party(10000, "h");
    host.table_namespace = " ".to_string();
    let err = generate_job_spec(
        JobType::Training,
        Some(AlgorithmType::HomoLr),
        &party(9999, "g"),
        &[host],
        &AlgorithmOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_validation());
}
