// Command handler for: Inspect
//
// Reads an XML artifact back and prints its verdict with the cleaned tuples
// of each field.

use std::path::Path;
use std::process::ExitCode;

use miette::IntoDiagnostic;
use serde_json::json;

use modelrun_core::classify;
use modelrun_engine::{clean_label, read_artifact, ArtifactDocument, Field};

use crate::OutputFormat;

pub(crate) fn run_inspect_command(
    path: &Path,
    field: Option<&str>,
    format: OutputFormat,
) -> miette::Result<ExitCode> {
    let doc = read_artifact(path).into_diagnostic()?;
    let fields: Vec<&Field> = match field {
        Some(label) => {
            let found = doc.instance.field(label).ok_or_else(|| {
                miette::miette!("artifact {} has no field `{label}`", path.display())
            })?;
            vec![found]
        }
        None => doc.instance.fields.iter().collect(),
    };

    match format {
        OutputFormat::Text => print!("{}", render_text(&doc, &fields)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json(&doc, &fields)).into_diagnostic()?
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn cleaned_tuples(field: &Field) -> Vec<Vec<String>> {
    field
        .tuples
        .iter()
        .map(|tuple| tuple.iter().map(|atom| clean_label(atom)).collect())
        .collect()
}

fn render_text(doc: &ArtifactDocument, fields: &[&Field]) -> String {
    let mut out = format!(
        "{}: {} ({})\n",
        classify(doc.kind, doc.satisfiable),
        doc.command,
        doc.kind
    );
    for field in fields {
        out.push_str(&format!("{}:\n", clean_label(&field.label)));
        for tuple in cleaned_tuples(field) {
            out.push_str(&format!("  {}\n", tuple.join(" -> ")));
        }
    }
    out
}

fn render_json(doc: &ArtifactDocument, fields: &[&Field]) -> serde_json::Value {
    let fields: Vec<_> = fields
        .iter()
        .map(|f| json!({ "label": clean_label(&f.label), "tuples": cleaned_tuples(f) }))
        .collect();
    json!({
        "command": doc.command,
        "kind": doc.kind,
        "ordinal": doc.ordinal,
        "classification": classify(doc.kind, doc.satisfiable),
        "fields": fields,
    })
}
