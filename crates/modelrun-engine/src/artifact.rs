//! XML artifacts for solved instances.
//!
//! The layout follows the model finder's own instance dump: an `<alloy>`
//! root holding one `<instance>` with `<sig>` and `<field>` children. The
//! `<instance>` element also records which command produced it and whether
//! it was satisfiable, so a reader can classify the artifact on its own.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use thiserror::Error;

use crate::model::{CommandKind, Field, Instance, Outcome, Sig};

/// Value of the root `builddate` attribute.
pub const BUILD_TAG: &str = concat!("modelrun ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed artifact: {0}")]
    Malformed(String),
}

/// An artifact as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDocument {
    pub command: String,
    pub kind: CommandKind,
    pub ordinal: Option<usize>,
    pub satisfiable: bool,
    pub filename: Option<String>,
    pub instance: Instance,
}

/// Render `outcome` and write it to `path`, creating parent directories.
pub fn write_outcome(path: &Path, outcome: &Outcome, source: &Path) -> Result<(), ArtifactError> {
    let xml = render_outcome(outcome, source)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, xml)?;
    Ok(())
}

pub fn render_outcome(outcome: &Outcome, source: &Path) -> Result<String, ArtifactError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("alloy").with_attributes([("builddate", BUILD_TAG)]),
    ))?;

    let ordinal = outcome.ordinal.to_string();
    let filename = source.to_string_lossy();
    let satisfiable = if outcome.satisfiable() { "true" } else { "false" };
    writer.write_event(Event::Start(BytesStart::new("instance").with_attributes([
        ("command", outcome.label.as_str()),
        ("kind", outcome.kind.as_str()),
        ("ordinal", ordinal.as_str()),
        ("satisfiable", satisfiable),
        ("filename", &*filename),
    ])))?;

    if let Some(instance) = outcome.instance() {
        let mut next_id = 0usize;
        for sig in &instance.sigs {
            let id = next_id.to_string();
            next_id += 1;
            writer.write_event(Event::Start(
                BytesStart::new("sig")
                    .with_attributes([("label", sig.label.as_str()), ("ID", id.as_str())]),
            ))?;
            for atom in &sig.atoms {
                write_atom(&mut writer, atom)?;
            }
            writer.write_event(Event::End(BytesEnd::new("sig")))?;
        }
        for field in &instance.fields {
            let id = next_id.to_string();
            next_id += 1;
            writer.write_event(Event::Start(
                BytesStart::new("field")
                    .with_attributes([("label", field.label.as_str()), ("ID", id.as_str())]),
            ))?;
            for tuple in &field.tuples {
                writer.write_event(Event::Start(BytesStart::new("tuple")))?;
                for atom in tuple {
                    write_atom(&mut writer, atom)?;
                }
                writer.write_event(Event::End(BytesEnd::new("tuple")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("field")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("instance")))?;
    writer.write_event(Event::End(BytesEnd::new("alloy")))?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| ArtifactError::Malformed(format!("non UTF-8 output: {e}")))?;
    xml.push('\n');
    Ok(xml)
}

fn write_atom(writer: &mut Writer<Vec<u8>>, label: &str) -> Result<(), ArtifactError> {
    writer.write_event(Event::Empty(
        BytesStart::new("atom").with_attributes([("label", label)]),
    ))?;
    Ok(())
}

pub fn read_artifact(path: &Path) -> Result<ArtifactDocument, ArtifactError> {
    let text = fs::read_to_string(path)?;
    parse_artifact(&text)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Open {
    Nothing,
    Sig,
    Field,
}

pub fn parse_artifact(xml: &str) -> Result<ArtifactDocument, ArtifactError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut header: Option<(String, CommandKind, Option<usize>, bool, Option<String>)> = None;
    let mut instance = Instance::default();
    let mut open = Open::Nothing;
    let mut tuple: Option<Vec<String>> = None;

    loop {
        let (element, empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                match e.name().as_ref() {
                    b"tuple" => {
                        if let (Some(done), Some(field)) =
                            (tuple.take(), instance.fields.last_mut())
                        {
                            field.tuples.push(done);
                        }
                    }
                    b"sig" | b"field" => open = Open::Nothing,
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match element.name().as_ref() {
            b"instance" => {
                if header.is_some() {
                    return Err(ArtifactError::Malformed(
                        "more than one <instance> element".into(),
                    ));
                }
                let command = required_attr(&element, "command")?;
                let kind = match attr(&element, "kind")? {
                    Some(raw) => CommandKind::parse(&raw).ok_or_else(|| {
                        ArtifactError::Malformed(format!("unknown command kind `{raw}`"))
                    })?,
                    None => infer_kind(&command),
                };
                let ordinal = attr(&element, "ordinal")?
                    .map(|raw| {
                        raw.parse::<usize>().map_err(|_| {
                            ArtifactError::Malformed(format!("invalid ordinal `{raw}`"))
                        })
                    })
                    .transpose()?;
                // The engine's own dumps only exist for satisfiable outcomes
                // and carry no flag.
                let satisfiable = match attr(&element, "satisfiable")?.as_deref() {
                    None | Some("true") => true,
                    Some("false") => false,
                    Some(other) => {
                        return Err(ArtifactError::Malformed(format!(
                            "invalid satisfiable flag `{other}`"
                        )))
                    }
                };
                let filename = attr(&element, "filename")?;
                header = Some((command, kind, ordinal, satisfiable, filename));
            }
            b"sig" => {
                instance.sigs.push(Sig {
                    label: required_attr(&element, "label")?,
                    atoms: Vec::new(),
                });
                open = if empty { Open::Nothing } else { Open::Sig };
            }
            b"field" => {
                instance.fields.push(Field {
                    label: required_attr(&element, "label")?,
                    tuples: Vec::new(),
                });
                open = if empty { Open::Nothing } else { Open::Field };
            }
            b"tuple" if open == Open::Field => {
                if empty {
                    if let Some(field) = instance.fields.last_mut() {
                        field.tuples.push(Vec::new());
                    }
                } else {
                    tuple = Some(Vec::new());
                }
            }
            b"atom" => {
                let label = required_attr(&element, "label")?;
                if let Some(tuple) = tuple.as_mut() {
                    tuple.push(label);
                } else if open == Open::Sig {
                    if let Some(sig) = instance.sigs.last_mut() {
                        sig.atoms.push(label);
                    }
                }
            }
            _ => {}
        }
    }

    let (command, kind, ordinal, satisfiable, filename) =
        header.ok_or_else(|| ArtifactError::Malformed("missing <instance> element".into()))?;
    Ok(ArtifactDocument {
        command,
        kind,
        ordinal,
        satisfiable,
        filename,
        instance,
    })
}

fn attr(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, ArtifactError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| ArtifactError::Malformed(e.to_string()))?;
        if attribute.key.as_ref() == key.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(element: &BytesStart<'_>, key: &str) -> Result<String, ArtifactError> {
    attr(element, key)?.ok_or_else(|| {
        ArtifactError::Malformed(format!(
            "<{}> is missing `{key}`",
            String::from_utf8_lossy(element.name().as_ref())
        ))
    })
}

/// Engine dumps label the instance with the command text, e.g. `Check X for 3`.
fn infer_kind(command: &str) -> CommandKind {
    if command.trim_start().to_ascii_lowercase().starts_with("check") {
        CommandKind::Check
    } else {
        CommandKind::Run
    }
}

/// Strip the module path and the atom index: `this/Flow$0` becomes `Flow`.
pub fn clean_label(raw: &str) -> String {
    let tail = raw.rsplit('/').next().unwrap_or(raw);
    tail.split('$').next().unwrap_or(tail).to_string()
}
