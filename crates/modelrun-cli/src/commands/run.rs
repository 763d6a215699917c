// Command handler for: Run (also the bare `modelrun <model>` form)
//
// Builds the bridge engine and run configuration from the flags, streams the
// report to stdout and turns crash-worthy failures and panics into a crash
// record.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::ExitCode;

use tracing::{debug, error};

use modelrun_core::{
    CrashRecord, FailurePolicy, JsonLinesSink, Orchestrator, ReportSink, RunConfig, RunStatus,
    TextSink,
};
use modelrun_engine::{BridgeConfig, BridgeEngine, Engine, SolveOptions, TracingReporter};

use crate::{OutputFormat, RunArgs};

pub(crate) fn bridge_config(args: &RunArgs) -> BridgeConfig {
    args.engine_args
        .iter()
        .fold(BridgeConfig::new(args.engine.clone()), |config, arg| {
            config.arg(arg.clone())
        })
}

pub(crate) fn run_config(args: &RunArgs) -> RunConfig {
    RunConfig {
        solve: SolveOptions {
            solver: args.solver.clone(),
            ..SolveOptions::default()
        }
        .with_timeout_secs(args.timeout),
        persist: !args.no_persist,
        out_dir: args.out_dir.clone(),
        failure_policy: if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Isolate
        },
        only: args.only.clone(),
    }
}

pub(crate) fn run_command(args: RunArgs) -> miette::Result<ExitCode> {
    let config = run_config(&args);
    debug!(?config, engine = %args.engine, "starting run");

    let mut orchestrator = Orchestrator::new(BridgeEngine::new(bridge_config(&args)), config);
    let mut sink: Box<dyn ReportSink> = match args.format {
        OutputFormat::Text => Box::new(TextSink::new(io::stdout().lock())),
        OutputFormat::Json => Box::new(JsonLinesSink::new(io::stdout().lock())),
    };
    drive(&mut orchestrator, &args, sink.as_mut())
}

/// Run the model named by `args` and map the result to an exit code,
/// writing a crash record for faults and panics.
fn drive<E: Engine>(
    orchestrator: &mut Orchestrator<E>,
    args: &RunArgs,
    sink: &mut dyn ReportSink,
) -> miette::Result<ExitCode> {
    let model = args.model.clone().unwrap_or_default();
    let mut reporter = TracingReporter;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        orchestrator.run(&model, sink, &mut reporter)
    }));

    let record = match outcome {
        Ok(Ok(result)) => {
            return match result.status {
                RunStatus::Completed => Ok(ExitCode::from(result.exit_code())),
                RunStatus::Aborted { ordinal } => Err(miette::miette!(
                    "run aborted: command {ordinal} failed and --fail-fast is set"
                )),
            };
        }
        Ok(Err(err)) if !err.is_crash() => return Err(miette::miette!("{err}")),
        Ok(Err(err)) => CrashRecord::from_error(&err),
        Err(payload) => CrashRecord::from_panic(payload.as_ref()),
    };

    write_crash(record, args, &model);
    Ok(ExitCode::FAILURE)
}

fn write_crash(record: CrashRecord, args: &RunArgs, model: &Path) {
    let record = record
        .with_context("model", model.display().to_string())
        .with_context("engine", args.engine.clone())
        .with_context("solver", args.solver.clone());
    eprintln!("{}", record.summary());
    if let Err(err) = record.write_to(&args.crash_log) {
        error!(
            path = %args.crash_log.display(),
            "could not write crash record: {err}"
        );
    }
}
