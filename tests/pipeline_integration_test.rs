//! End-to-end tests for the metrics and forecast runs

mod common;

use abuser_recurrence_forecast::{
    analytics::{render, ReportFilter, ReportFormat},
    config::Config,
    ml::{
        CategoricalField, CategoryEncoder, FeatureBuilder, ForecastModel, IncidentForecaster,
        ModelConfig, Regressor, UNKNOWN_CATEGORY_CODE,
    },
    pipeline::{compute_forecasts, compute_metrics, Pipeline},
    store::{load_metrics_table, CsvIncidentStore, InMemoryStore, IncidentStore},
    AppError,
};
use common::{date, scenario_a1, synthetic_corpus, write_incidents, IncidentBuilder};
use std::path::Path;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.incidents = dir.join("incidents.csv");
    config.paths.metrics_output = dir.join("frequency_analysis.csv");
    config.paths.forecast_output = dir.join("incident_predictions.csv");
    config.model.n_estimators = 20;
    config
}

#[test]
fn test_scenario_a1_metrics() {
    let table = compute_metrics(&scenario_a1()).unwrap();
    let a1 = table.get("A1").unwrap();

    assert_eq!(a1.incident_count, 3);
    assert_eq!(a1.avg_days_between_incidents, 45);
    assert_eq!(a1.max_severity, 9);
    assert_eq!(a1.avg_severity, 7);
    assert_eq!(a1.hospitalization_rate, 67);
    assert_eq!(a1.arrest_rate, 67);
}

#[test]
fn test_single_incident_abuser_gets_default_gap() {
    let incidents = vec![IncidentBuilder::new("S1", date(2023, 6, 1)).build()];
    let table = compute_metrics(&incidents).unwrap();
    assert_eq!(table.get("S1").unwrap().avg_days_between_incidents, 365);
}

#[test]
fn test_metrics_table_written_as_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    write_incidents(&config.paths.incidents, &scenario_a1());

    let pipeline = Pipeline::new(config.clone());
    pipeline
        .run_metrics(&CsvIncidentStore::new(&config.paths.incidents))
        .unwrap();

    let written = std::fs::read_to_string(&config.paths.metrics_output).unwrap();
    assert_eq!(
        written,
        "Abuser_ID,incident_count,avg_days_between_incidents,avg_severity,max_severity,hospitalization_rate,arrest_rate\nA1,3,45,7,9,67,67\n"
    );
    assert!(!config.paths.forecast_output.exists());
}

#[test]
fn test_full_run_one_forecast_per_abuser() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let incidents = synthetic_corpus(40);
    write_incidents(&config.paths.incidents, &incidents);

    let output = Pipeline::new(config.clone())
        .run(&CsvIncidentStore::new(&config.paths.incidents))
        .unwrap();

    assert_eq!(output.metrics.len(), 40);
    assert_eq!(output.forecast.forecasts.len(), 40);
    assert!(output.forecast.unseen_categories.is_empty());

    let evaluation = output.forecast.training.evaluation.unwrap();
    assert!(evaluation.mae >= 0.0);
    assert_eq!(
        output.forecast.training.training_rows + output.forecast.training.held_out_rows,
        incidents.len()
    );

    for forecast in &output.forecast.forecasts {
        let latest = incidents
            .iter()
            .filter(|i| i.abuser_id == forecast.abuser_id)
            .map(|i| i.incident_date)
            .max()
            .unwrap();
        assert!(forecast.days_until_next >= 0);
        assert_eq!(
            forecast.next_incident_date,
            latest + chrono::Duration::days(forecast.days_until_next)
        );
    }

    let written = std::fs::read_to_string(&config.paths.forecast_output).unwrap();
    let mut lines = written.lines();
    assert_eq!(
        lines.next(),
        Some("Abuser_ID,next_incident_date,days_until_next")
    );
    assert_eq!(lines.count(), 40);
}

#[test]
fn test_identical_runs_are_byte_identical() {
    let incidents = synthetic_corpus(30);
    let mut outputs = Vec::new();

    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        Pipeline::new(config.clone())
            .run(&InMemoryStore::new(incidents.clone()))
            .unwrap();
        outputs.push((
            std::fs::read(&config.paths.metrics_output).unwrap(),
            std::fs::read(&config.paths.forecast_output).unwrap(),
        ));
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_two_step_run_matches_one_step() {
    let incidents = synthetic_corpus(25);

    let one_step_dir = tempfile::tempdir().unwrap();
    let one_step = config_in(one_step_dir.path());
    Pipeline::new(one_step.clone())
        .run(&InMemoryStore::new(incidents.clone()))
        .unwrap();

    let two_step_dir = tempfile::tempdir().unwrap();
    let two_step = config_in(two_step_dir.path());
    let pipeline = Pipeline::new(two_step.clone());
    let store = InMemoryStore::new(incidents);
    pipeline.run_metrics(&store).unwrap();
    pipeline.run_forecast(&store).unwrap();

    assert_eq!(
        std::fs::read(&one_step.paths.forecast_output).unwrap(),
        std::fs::read(&two_step.paths.forecast_output).unwrap()
    );
}

#[test]
fn test_forecast_rejects_metrics_for_unknown_abuser() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let pipeline = Pipeline::new(config.clone());

    let mut incidents = scenario_a1();
    incidents.push(IncidentBuilder::new("B2", date(2023, 3, 3)).build());
    pipeline
        .run_metrics(&InMemoryStore::new(incidents))
        .unwrap();

    let result = pipeline.run_forecast(&InMemoryStore::new(scenario_a1()));
    assert!(matches!(
        result,
        Err(AppError::JoinIntegrity { ref abuser_id, .. }) if abuser_id == "B2"
    ));
    assert!(!config.paths.forecast_output.exists());
}

#[test]
fn test_forecast_rejects_incidents_without_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let pipeline = Pipeline::new(config.clone());
    pipeline
        .run_metrics(&InMemoryStore::new(scenario_a1()))
        .unwrap();

    let mut incidents = scenario_a1();
    incidents.push(IncidentBuilder::new("C3", date(2023, 5, 5)).build());
    let result = pipeline.run_forecast(&InMemoryStore::new(incidents));
    assert!(matches!(
        result,
        Err(AppError::JoinIntegrity { ref abuser_id, .. }) if abuser_id == "C3"
    ));
}

#[test]
fn test_schema_error_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::write(
        &config.paths.incidents,
        format!(
            "{}\nA1,V1,2023-01-01,1980-01-01,Male,Physical,Spouse,Kyiv,11,None,None\n",
            common::INCIDENT_HEADER
        ),
    )
    .unwrap();

    let result = Pipeline::new(config.clone()).run(&CsvIncidentStore::new(&config.paths.incidents));
    assert!(result.unwrap_err().is_schema_error());
    assert!(!config.paths.metrics_output.exists());
    assert!(!config.paths.forecast_output.exists());
}

#[test]
fn test_metrics_table_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let store = InMemoryStore::new(synthetic_corpus(12));

    let computed = Pipeline::new(config.clone()).run_metrics(&store).unwrap();
    let loaded = load_metrics_table(&config.paths.metrics_output).unwrap();
    assert_eq!(computed, loaded);
}

#[test]
fn test_unseen_region_at_prediction_time() {
    let training_corpus = synthetic_corpus(20);
    let metrics = compute_metrics(&training_corpus).unwrap();

    let encoder = CategoryEncoder::fit(&training_corpus);
    let training = FeatureBuilder::new(&metrics, &encoder)
        .training_set(&training_corpus)
        .unwrap();
    let config = ModelConfig {
        n_estimators: 10,
        ..ModelConfig::default()
    };
    let model = ForecastModel::train(&training, encoder, &config).unwrap();

    // Same abusers, one of them now reported from a region never seen in training
    let mut later = training_corpus.clone();
    later.push(
        IncidentBuilder::new("AB0000", date(2024, 6, 1))
            .oblast("Zakarpattia")
            .build(),
    );

    let output = IncidentForecaster::new(&model)
        .forecast(&later, &metrics)
        .unwrap();
    assert_eq!(output.forecasts.len(), 20);
    assert_eq!(output.unseen_categories.len(), 1);
    assert_eq!(output.unseen_categories[0].field, CategoricalField::Oblast);
    assert_eq!(output.unseen_categories[0].abuser_id, "AB0000");
    assert_eq!(
        model.encoder().encode(CategoricalField::Oblast, "Zakarpattia"),
        UNKNOWN_CATEGORY_CODE
    );

    let forecast = output
        .forecasts
        .iter()
        .find(|f| f.abuser_id == "AB0000")
        .unwrap();
    assert_eq!(
        forecast.next_incident_date,
        date(2024, 6, 1) + chrono::Duration::days(forecast.days_until_next)
    );
}

#[test]
fn test_tiny_corpus_trains_without_evaluation() {
    let incidents = scenario_a1();
    let metrics = compute_metrics(&incidents).unwrap();
    let run = compute_forecasts(&incidents, &metrics, &ModelConfig::default()).unwrap();

    assert!(run.training.evaluation.is_none());
    assert_eq!(run.training.training_rows, 3);
    assert_eq!(run.forecasts.len(), 1);
    assert_eq!(run.forecasts[0].days_until_next, 45);
    assert_eq!(run.forecasts[0].next_incident_date, date(2023, 5, 16));
}

#[test]
fn test_report_over_persisted_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let pipeline = Pipeline::new(config);
    let store = InMemoryStore::new(synthetic_corpus(16));
    pipeline.run(&store).unwrap();

    let filter = ReportFilter {
        oblast: Some("Kyiv".to_string()),
        ..ReportFilter::default()
    };
    let report = pipeline.report(&store, &filter).unwrap();
    assert_eq!(report.region, "Kyiv");
    assert!(report
        .high_risk_abusers
        .iter()
        .all(|a| a.predicted_next_incident.is_some()));
    assert!(report
        .severity_by_oblast
        .iter()
        .all(|o| o.oblast == "Kyiv"));

    let json = render(&report, ReportFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["min_severity"], 6);
}

#[test]
fn test_store_describe() {
    let store = CsvIncidentStore::new("data/incidents.csv");
    assert_eq!(store.describe(), "csv:data/incidents.csv");
}
