//! Integration tests for geoflow-core
//!
//! These tests run complete command files through the processor and check
//! the statuses, workspace contents and files they produce.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use geoflow_core::command::{CommandBehavior, CommandContext};
use geoflow_core::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use geoflow_core::config::EngineConfig;
use geoflow_core::error::Result;
use geoflow_core::execution::{AbortReason, EngineFault};
use geoflow_core::file_handling::get_expected_results;
use geoflow_core::parameter::{ParameterSet, Value};
use geoflow_core::parser::parse_text;
use geoflow_core::processor::{Processor, RunState};
use geoflow_core::registry::{global, CommandRegistry, RegistryEntry};
use geoflow_core::regression::{run_regression, CaseVerdict};
use geoflow_core::status::Status;
use tempfile::tempdir;

const RIVERS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "North"}, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
    {"type": "Feature", "properties": {"name": "South"}, "geometry": {"type": "Point", "coordinates": [3.0, 4.0]}}
  ]
}"#;

/// Counts how often it runs.
struct Spy {
    runs: Arc<AtomicUsize>,
}

impl CommandBehavior for Spy {
    fn run(&self, _params: &ParameterSet, _ctx: &mut CommandContext<'_>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Cancels the run it belongs to.
struct CancelRun;

impl CommandBehavior for CancelRun {
    fn run(&self, _params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        ctx.cancel_token().cancel();
        Ok(())
    }
}

fn spy_registry(runs: &Arc<AtomicUsize>) -> Arc<CommandRegistry> {
    let mut registry = CommandRegistry::with_builtins();

    let counter = runs.clone();
    registry
        .register(RegistryEntry::new(
            CommandDefinition::new("Spy", "Count runs").parameter(ParameterDefinition::optional(
                "Label",
                ParameterType::String,
            )),
            move || Arc::new(Spy { runs: counter.clone() }),
        ))
        .unwrap();

    let counter = runs.clone();
    registry
        .register(RegistryEntry::new(
            CommandDefinition::new("StrictSpy", "Count runs of a command with a required parameter")
                .parameter(ParameterDefinition::required("Target", ParameterType::Identifier)),
            move || Arc::new(Spy { runs: counter.clone() }),
        ))
        .unwrap();

    registry
        .register(RegistryEntry::new(
            CommandDefinition::new("CancelRun", "Cancel the current run"),
            || Arc::new(CancelRun),
        ))
        .unwrap();

    Arc::new(registry)
}

fn processor_in(dir: &Path) -> Processor {
    let mut processor = Processor::new();
    processor.set_property("WorkingDir", Value::Path(dir.to_path_buf()));
    processor
}

#[test]
fn test_for_loop_runs_body_once_per_value_in_order() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut processor = Processor::with_registry(spy_registry(&runs), EngineConfig::default());
    processor.load_text(concat!(
        "SetProperty(PropertyName=Trace,PropertyValue=\">\")\n",
        "For(Name=\"var\",SequenceStart=1,SequenceEnd=3)\n",
        "Spy(Label=\"${var}\")\n",
        "SetProperty(PropertyName=Trace,PropertyValue=\"${Trace}${var},\")\n",
        "EndFor(Name=\"var\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.status, Status::Success);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(
        processor.workspace().property_text("Trace").as_deref(),
        Some(">1,2,3,")
    );
    assert_eq!(processor.workspace().property("var"), Some(&Value::Integer(3)));
}

#[test]
fn test_if_false_leaves_body_unknown() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut processor = Processor::with_registry(spy_registry(&runs), EngineConfig::default());
    processor.load_text(concat!(
        "If(Name=\"x\",Condition=\"false\")\n",
        "Spy()\n",
        "NoSuchCommand()\n",
        "EndIf(Name=\"x\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(result.outcomes[1].status, Status::Unknown);
    assert_eq!(result.outcomes[2].status, Status::Unknown);
    assert_eq!(result.status, Status::Success);
}

#[test]
fn test_missing_required_parameter_fails_without_running() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut processor = Processor::with_registry(spy_registry(&runs), EngineConfig::default());
    processor.load_text("StrictSpy()\nStrictSpy(Target=\"Layer1\")\n");

    let result = processor.run_all();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(result.outcomes[0].status, Status::Failure);
    assert!(result.outcomes[0].messages[0].contains("Target"));
    assert_eq!(result.outcomes[1].status, Status::Success);
}

#[test]
fn test_unknown_parameter_name_fails_validation() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut processor = Processor::with_registry(spy_registry(&runs), EngineConfig::default());
    processor.load_text("Spy(Lable=\"typo\")\n");

    assert_eq!(processor.commands()[0].parse_warnings().len(), 1);

    let result = processor.run_all();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(result.status, Status::Failure);
}

#[test]
fn test_aggregate_failure_keeps_one_outcome_per_command() {
    let mut processor = Processor::new();
    processor.load_text(concat!(
        "# Three commands and a comment\n",
        "Message(Message=\"first\")\n",
        "WriteGeoLayerToGeoJSON(GeoLayerID=\"Missing\",OutputFile=\"out.geojson\")\n",
        "Message(Message=\"third\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.outcomes.len(), processor.commands().len());
    assert_eq!(result.outcomes[2].status, Status::Failure);
    assert!(result.outcomes[2].messages[0].contains("Missing"));
    assert_eq!(result.outcomes[3].status, Status::Success);
}

#[test]
fn test_geojson_read_write_scenario() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rivers.geojson"), RIVERS).unwrap();
    let command_file = dir.path().join("workflow.gp");
    fs::write(
        &command_file,
        concat!(
            "# Copy a layer through the workspace\n",
            "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\",Name=\"Main rivers\")\n",
            "WriteGeoLayerToGeoJSON(GeoLayerID=\"Rivers\",OutputFile=\"${WorkingDir}/copy.geojson\")\n",
        ),
    )
    .unwrap();

    let mut processor = Processor::new();
    processor.load_file(&command_file).unwrap();
    let result = processor.run_all();

    assert_eq!(result.status, Status::Success);
    let layer = processor.workspace().geolayer("Rivers").unwrap();
    assert_eq!(layer.name, "Main rivers");
    assert_eq!(layer.feature_count(), 2);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("copy.geojson")).unwrap()).unwrap();
    let original: serde_json::Value = serde_json::from_str(RIVERS).unwrap();
    assert_eq!(written, original);
}

#[test]
fn test_rerun_resets_statuses_and_keeps_layers() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rivers.geojson"), RIVERS).unwrap();

    let mut processor = processor_in(dir.path());
    processor.load_text(concat!(
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\")\n",
        "NoSuchCommand()\n",
    ));
    let first = processor.run_all();
    assert_eq!(first.status, Status::Failure);

    processor.load_text("WriteGeoLayerToGeoJSON(GeoLayerID=\"Rivers\",OutputFile=\"again.geojson\")\n");
    let second = processor.run_all();
    assert_eq!(second.status, Status::Success);
    assert!(dir.path().join("again.geojson").is_file());

    let third = processor.run_all();
    assert_eq!(third.outcomes[0].messages.len(), second.outcomes[0].messages.len());
    assert!(processor.workspace().has_geolayer("Rivers"));
}

#[test]
fn test_if_geolayer_id_exists_policies() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rivers.geojson"), RIVERS).unwrap();

    let mut processor = processor_in(dir.path());
    processor.load_text(concat!(
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\",Name=\"first\")\n",
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\",Name=\"second\",IfGeoLayerIDExists=Warn)\n",
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\",IfGeoLayerIDExists=fail)\n",
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\",Name=\"third\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.outcomes[0].status, Status::Success);
    assert_eq!(result.outcomes[1].status, Status::Warning);
    assert_eq!(result.outcomes[2].status, Status::Failure);
    assert_eq!(result.outcomes[3].status, Status::Success);
    assert_eq!(processor.workspace().geolayer("Rivers").unwrap().name, "third");
}

#[test]
fn test_loop_over_table_column_copies_layers() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rivers.geojson"), RIVERS).unwrap();
    fs::write(dir.path().join("copies.csv"), "id\nCopyA\nCopyB\n").unwrap();

    let mut processor = processor_in(dir.path());
    processor.load_text(concat!(
        "ReadGeoLayerFromGeoJSON(InputFile=\"rivers.geojson\",GeoLayerID=\"Rivers\")\n",
        "ReadTableFromDelimitedFile(InputFile=\"copies.csv\",TableID=\"Copies\")\n",
        "For(Name=\"copy\",TableID=\"Copies\",TableColumn=\"id\")\n",
        "CopyGeoLayer(GeoLayerID=\"Rivers\",CopiedGeoLayerID=\"${copy}\")\n",
        "EndFor(Name=\"copy\")\n",
        "FreeGeoLayers(GeoLayerIDs=\"Rivers\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.status, Status::Success);
    let ids: Vec<&str> = processor.workspace().geolayer_ids().collect();
    assert_eq!(ids, vec!["CopyA", "CopyB"]);
}

#[test]
fn test_table_read_write_round_trip() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("in.csv"), "station;flow\nS1;12.5\nS2;3\n").unwrap();

    let mut processor = processor_in(dir.path());
    processor.load_text(concat!(
        "ReadTableFromDelimitedFile(InputFile=\"in.csv\",TableID=\"Flows\",Delimiter=\";\")\n",
        "WriteTableToDelimitedFile(TableID=\"Flows\",OutputFile=\"out.csv\")\n",
        "FreeTable(TableID=\"Flows\")\n",
        "FreeTable(TableID=\"Flows\")\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.outcomes[2].status, Status::Success);
    assert_eq!(result.outcomes[3].status, Status::Failure);
    assert_eq!(
        fs::read_to_string(dir.path().join("out.csv")).unwrap(),
        "station,flow\nS1,12.5\nS2,3\n"
    );
}

#[test]
fn test_round_trip_regeneration_is_idempotent() {
    let text = concat!(
        "# Header comment\n",
        "\n",
        "/*\n",
        "Message(Message=\"disabled\")\n",
        "*/\n",
        "For(Name=\"i\", SequenceStart=1, SequenceEnd=2)\n",
        "  Message(Message=\"a, b = (c)\")\n",
        "EndFor(Name=\"i\")\n",
        "Broken(\n",
    );

    let mut processor = Processor::new();
    processor.load_text(text);
    assert_eq!(processor.to_text(), text);

    processor
        .set_command_parameter(6, "Message", "edited, again")
        .unwrap();
    let regenerated = processor.to_text();
    let reparsed = parse_text(&regenerated, &global());

    assert_eq!(reparsed.len(), processor.commands().len());
    assert_eq!(reparsed[6].parameter("Message"), Some("edited, again"));
    for (a, b) in reparsed.iter().zip(processor.commands()) {
        assert_eq!(a.name(), b.name());
        assert_eq!(a.parameters(), b.parameters());
    }
}

#[test]
fn test_cancellation_aborts_at_next_command() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut processor = Processor::with_registry(spy_registry(&runs), EngineConfig::default());
    processor.load_text("Spy()\nCancelRun()\nSpy()\nSpy()\n");

    let result = processor.run_all();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(result.state, RunState::Aborted);
    assert_eq!(result.abort, Some(AbortReason::Cancelled));
    assert_eq!(result.outcomes[2].status, Status::Failure);
    assert_eq!(result.outcomes[3].status, Status::Unknown);

    processor.cancel_token().reset();
    let rerun = processor.run_all();
    assert_eq!(rerun.state, RunState::Aborted);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_independent_processors_run_on_threads() {
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            thread::spawn(move || {
                let mut processor = Processor::new();
                processor.load_text(&format!(
                    concat!(
                        "For(Name=\"i\",SequenceStart=1,SequenceEnd={})\n",
                        "SetProperty(PropertyName=Trace,PropertyValue=\"${{Trace}}${{i}}\")\n",
                        "EndFor(Name=\"i\")\n",
                    ),
                    n
                ));
                processor.set_property("Trace", "#");
                let result = processor.run_all();
                (result.status, processor.workspace().property_text("Trace"))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![
            (Status::Success, Some("#1".to_string())),
            (Status::Success, Some("#12".to_string())),
            (Status::Success, Some("#123".to_string())),
            (Status::Success, Some("#1234".to_string())),
        ]
    );
}

#[test]
fn test_unmatched_and_missing_block_terminators() {
    let mut processor = Processor::new();
    processor.load_text("EndFor(Name=\"i\")\nEndIf(Name=\"x\")\nMessage(Message=\"after\")\n");
    let result = processor.run_all();
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.outcomes[0].status, Status::Failure);
    assert_eq!(result.outcomes[1].status, Status::Failure);
    assert_eq!(result.outcomes[2].status, Status::Success);

    processor.load_text("If(Name=\"x\",Condition=\"true\")\nMessage(Message=\"body\")\n");
    let result = processor.run_all();
    assert_eq!(result.state, RunState::Aborted);
    assert!(matches!(
        result.abort,
        Some(AbortReason::Fault(EngineFault::MissingTerminator { .. }))
    ));
}

#[test]
fn test_run_commands_checks_expected_status() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("warns.gp"),
        "#@expectedStatus Warning\nMessage(Message=\"careful\",CommandStatus=Warning)\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("fails.gp"),
        "Message(Message=\"broken\",CommandStatus=Failure)\n",
    )
    .unwrap();

    let mut processor = processor_in(dir.path());
    processor.load_text(concat!(
        "RunCommands(CommandFile=\"warns.gp\")\n",
        "RunCommands(CommandFile=\"fails.gp\")\n",
        "RunCommands(CommandFile=\"fails.gp\",ExpectedStatus=Failure)\n",
    ));

    let result = processor.run_all();

    assert_eq!(result.outcomes[0].status, Status::Success);
    assert_eq!(result.outcomes[1].status, Status::Failure);
    assert!(result.outcomes[1].messages[0].contains("SUCCESS was expected"));
    assert_eq!(result.outcomes[2].status, Status::Success);
}

#[test]
fn test_regression_run_from_expected_results_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ok.gp"), "Message(Message=\"fine\")\n").unwrap();
    fs::write(
        dir.path().join("missing_layer.gp"),
        "#@expectedStatus Failure\nWriteGeoLayerToGeoJSON(GeoLayerID=\"Nope\",OutputFile=\"x.geojson\")\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("disabled.gp"),
        "#@enabled False\nNoSuchCommand()\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("too_severe.gp"),
        "Message(Message=\"oops\",CommandStatus=Warning)\n",
    )
    .unwrap();
    let expected_path = dir.path().join("expected.yml");
    fs::write(
        &expected_path,
        concat!(
            "- command_file: ok.gp\n",
            "  expected_status: Warning\n",
            "- command_file: missing_layer.gp\n",
            "  commands:\n",
            "    - line: 2\n",
            "      status: Failure\n",
            "      message: does not exist\n",
            "- command_file: disabled.gp\n",
            "- command_file: too_severe.gp\n",
            "- command_file: not_there.gp\n",
        ),
    )
    .unwrap();

    let cases = get_expected_results(&expected_path).unwrap();
    let report = run_regression(&cases, dir.path(), &global(), &EngineConfig::default());

    let verdicts: Vec<CaseVerdict> = report.cases.iter().map(|c| c.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            CaseVerdict::Pass,
            CaseVerdict::Pass,
            CaseVerdict::Skipped,
            CaseVerdict::Fail,
            CaseVerdict::Fail,
        ]
    );
    assert_eq!(report.exit_code(), 1);
}
