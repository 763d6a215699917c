mod common;

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use modelrun_core::{
    Classification, FailurePolicy, MemorySink, Orchestrator, ReportEntry, ReportSink, RunConfig,
    RunError, RunResult, RunStatus,
};
use modelrun_engine::{
    read_artifact, CollectingReporter, Command, CommandKind, Engine, EngineError, Model,
    NullReporter, Outcome, Reporter, SolveOptions,
};

use common::{model_file, Answer, MockEngine, ParseScript};

fn config(out: &TempDir) -> RunConfig {
    RunConfig {
        out_dir: out.path().join("out"),
        ..RunConfig::default()
    }
}

#[test]
fn zero_commands_complete_with_empty_report() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "empty.als");
    let mut orchestrator = Orchestrator::new(MockEngine::new(Vec::new()), config(&tmp));
    let mut sink = MemorySink::default();

    let result = orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.entries.is_empty());
    assert_eq!(result.exit_code(), 0);
    assert!(sink.finished);
}

#[test]
fn violations_are_persisted_and_run_still_completes() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("NoUnmitigatedThreat", CommandKind::Check),
        ("ShowFlows", CommandKind::Run),
        ("AllMitigated", CommandKind::Check),
    ])
    .answer("NoUnmitigatedThreat", Answer::Sat)
    .answer("ShowFlows", Answer::Sat);
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));
    let mut sink = MemorySink::default();

    let result = orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap();

    let verdicts: Vec<_> = result
        .entries
        .iter()
        .map(|e| (e.ordinal, e.classification))
        .collect();
    assert_eq!(
        verdicts,
        vec![
            (1, Classification::Violation),
            (2, Classification::InstanceFound),
            (3, Classification::NoViolation),
        ]
    );
    assert_eq!(result.exit_code(), 0);
    assert_eq!(sink.entries, result.entries);

    let first = result.entries[0].artifact.as_ref().expect("violation artifact");
    assert_eq!(
        first,
        &tmp.path().join("out").join("threats.1-nounmitigatedthreat.xml")
    );
    let doc = read_artifact(first).unwrap();
    assert_eq!(doc.command, "NoUnmitigatedThreat");
    assert!(doc.satisfiable);
    assert!(result.entries[2].artifact.is_none());
}

#[test]
fn persistence_failure_is_a_warning_on_that_entry_only() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("First", CommandKind::Check),
        ("Second", CommandKind::Check),
        ("Third", CommandKind::Run),
    ])
    .answer("First", Answer::Sat)
    .answer("Second", Answer::Sat)
    .answer("Third", Answer::Sat);
    // A directory squatting on the artifact path makes the write fail.
    fs::create_dir_all(tmp.path().join("out").join("threats.2-second.xml")).unwrap();
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));
    let mut sink = MemorySink::default();

    let result = orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries.len(), 3);
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.entries[0].artifact.is_some());
    assert!(result.entries[1].artifact.is_none());
    assert!(result.entries[1].warning.is_some());
    assert_eq!(result.entries[1].classification, Classification::Violation);
    assert!(result.entries[2].artifact.is_some());
    assert!(result.entries[2].warning.is_none());
}

#[test]
fn parse_diagnostic_yields_no_entries_and_no_artifacts() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "broken.als");
    let engine = MockEngine::failing_parse(ParseScript::Diagnostic("syntax error at line 4"));
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));
    let mut sink = MemorySink::default();

    let err = orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap_err();

    match &err {
        RunError::Parse { diagnostic, .. } => assert_eq!(diagnostic, "syntax error at line 4"),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(!err.is_crash());
    assert!(sink.entries.is_empty());
    assert!(!sink.finished);
    assert!(!tmp.path().join("out").exists());
    assert!(orchestrator.engine().solved.is_empty());
}

#[test]
fn engine_crash_during_parse_is_an_unexpected_fault() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::failing_parse(ParseScript::Crash("bridge closed its output"));
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));

    let err = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap_err();

    assert!(err.is_crash());
    let source = std::error::Error::source(&err).expect("fault keeps its cause");
    assert!(source.to_string().contains("bridge closed its output"));
}

#[test]
fn missing_model_file_is_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let mut orchestrator = Orchestrator::new(MockEngine::new(Vec::new()), config(&tmp));
    let err = orchestrator
        .run(
            &tmp.path().join("nope.als"),
            &mut MemorySink::default(),
            &mut NullReporter,
        )
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidInput(_)));
    assert_eq!(orchestrator.engine().parses, 0);
}

#[test]
fn timeout_is_cancelled_and_next_command_runs() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "slow.als");
    let engine = MockEngine::new(vec![
        ("Slow", CommandKind::Check),
        ("Fast", CommandKind::Run),
    ])
    .answer("Slow", Answer::Timeout)
    .answer("Fast", Answer::Sat);
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries[0].classification, Classification::Cancelled);
    assert!(result.entries[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(result.entries[1].classification, Classification::InstanceFound);
    assert_eq!(result.status, RunStatus::Completed);
}

#[test]
fn command_error_is_isolated_by_default() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("Broken", CommandKind::Check),
        ("Fine", CommandKind::Check),
    ])
    .answer("Broken", Answer::Fault("translation to kodkod failed"));
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.entries[0].classification, Classification::CommandError);
    assert_eq!(
        result.entries[0].error.as_deref(),
        Some("translation to kodkod failed")
    );
    assert_eq!(result.entries[1].classification, Classification::NoViolation);
    assert_eq!(result.exit_code(), 0);
}

#[test]
fn fail_fast_stops_after_first_command_error() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("Ok", CommandKind::Run),
        ("Broken", CommandKind::Check),
        ("Never", CommandKind::Check),
    ])
    .answer("Broken", Answer::Fault("out of memory"));
    let mut orchestrator = Orchestrator::new(
        engine,
        RunConfig {
            failure_policy: FailurePolicy::Abort,
            ..config(&tmp)
        },
    );
    let mut sink = MemorySink::default();

    let result = orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap();

    assert_eq!(result.status, RunStatus::Aborted { ordinal: 2 });
    assert_eq!(result.exit_code(), 1);
    assert_eq!(sink.entries.len(), 2);
    assert_eq!(orchestrator.engine().solved, vec![1, 2]);
}

#[test]
fn engine_dying_on_one_command_is_isolated() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("Heavy", CommandKind::Check),
        ("Light", CommandKind::Check),
    ])
    .answer("Heavy", Answer::Crash("engine closed its output"));
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.entries[0].classification, Classification::CommandError);
    assert!(result.entries[0]
        .error
        .as_deref()
        .unwrap()
        .contains("closed its output"));
    assert_eq!(result.entries[1].classification, Classification::NoViolation);
    assert_eq!(orchestrator.engine().solved, vec![1, 2]);
}

#[test]
fn engine_that_cannot_start_during_solve_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("First", CommandKind::Check),
        ("Second", CommandKind::Check),
    ])
    .answer("First", Answer::Unstartable);
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));

    let err = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap_err();

    assert!(matches!(err, RunError::UnexpectedFault { .. }));
    assert!(err.is_crash());
    assert_eq!(orchestrator.engine().solved, vec![1]);
}

/// Engine and sink writing into one shared log, to observe interleaving.
struct LoggingEngine {
    inner: MockEngine,
    log: Rc<RefCell<Vec<String>>>,
}

impl Engine for LoggingEngine {
    fn parse(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Model, EngineError> {
        self.inner.parse(path, reporter)
    }

    fn solve(
        &mut self,
        model: &Model,
        command: &Command,
        options: &SolveOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome, EngineError> {
        self.log.borrow_mut().push(format!("solve {}", command.label));
        self.inner.solve(model, command, options, reporter)
    }
}

struct LoggingSink {
    log: Rc<RefCell<Vec<String>>>,
}

impl ReportSink for LoggingSink {
    fn emit(&mut self, entry: &ReportEntry) -> io::Result<()> {
        self.log.borrow_mut().push(format!("emit {}", entry.label));
        Ok(())
    }

    fn finish(&mut self, _result: &RunResult) -> io::Result<()> {
        self.log.borrow_mut().push("finish".into());
        Ok(())
    }
}

#[test]
fn entries_are_emitted_as_each_command_finishes() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let log = Rc::new(RefCell::new(Vec::new()));
    let engine = LoggingEngine {
        inner: MockEngine::new(vec![("A", CommandKind::Check), ("B", CommandKind::Run)])
            .answer("A", Answer::Sat),
        log: Rc::clone(&log),
    };
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));
    let mut sink = LoggingSink {
        log: Rc::clone(&log),
    };

    orchestrator
        .run(&model, &mut sink, &mut NullReporter)
        .unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["solve A", "emit A", "solve B", "emit B", "finish"]
    );
}

#[test]
fn command_filter_keeps_declaration_ordinals() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![
        ("A", CommandKind::Check),
        ("B", CommandKind::Run),
        ("C", CommandKind::Check),
    ]);
    let mut orchestrator = Orchestrator::new(
        engine,
        RunConfig {
            only: Some("C".into()),
            ..config(&tmp)
        },
    );

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].ordinal, 3);
    assert_eq!(orchestrator.engine().solved, vec![3]);
}

#[test]
fn unknown_command_filter_is_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let mut orchestrator = Orchestrator::new(
        MockEngine::new(vec![("A", CommandKind::Check)]),
        RunConfig {
            only: Some("Z".into()),
            ..config(&tmp)
        },
    );
    let err = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidInput(message) if message.contains("`Z`")));
}

#[test]
fn stale_artifact_is_removed_even_when_command_no_longer_fails() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let stale = tmp.path().join("out").join("threats.1-nothreat.xml");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "<alloy/>").unwrap();
    let mut orchestrator = Orchestrator::new(
        MockEngine::new(vec![("NoThreat", CommandKind::Check)]),
        config(&tmp),
    );

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries[0].classification, Classification::NoViolation);
    assert!(!stale.exists());
}

#[test]
fn no_persist_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine =
        MockEngine::new(vec![("NoThreat", CommandKind::Check)]).answer("NoThreat", Answer::Sat);
    let mut orchestrator = Orchestrator::new(
        engine,
        RunConfig {
            persist: false,
            ..config(&tmp)
        },
    );

    let result = orchestrator
        .run(&model, &mut MemorySink::default(), &mut NullReporter)
        .unwrap();

    assert_eq!(result.entries[0].classification, Classification::Violation);
    assert!(result.entries[0].artifact.is_none());
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn engine_warnings_reach_the_reporter() {
    let tmp = TempDir::new().unwrap();
    let model = model_file(tmp.path(), "threats.als");
    let engine = MockEngine::new(vec![("A", CommandKind::Check)])
        .warn("field has_threat is redundant");
    let mut orchestrator = Orchestrator::new(engine, config(&tmp));
    let mut reporter = CollectingReporter::default();

    orchestrator
        .run(&model, &mut MemorySink::default(), &mut reporter)
        .unwrap();

    assert_eq!(reporter.warnings, vec!["field has_threat is redundant"]);
}
