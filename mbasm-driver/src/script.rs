//! Declaration scripts
//!
//! A script is a JSON list of the calls a front end would make, in order.
//! Running one replays them against a registry. A failing step is reported
//! and skipped so one run shows every problem in the script.

use log::{debug, info};
use mbasm_common::{Address, Bank, DataError, DataResult, ErrorReporter};
use mbasm_data::{normalize, Entity, RawValue, Registry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Select the threads later private variables and pointers are declared on
    Threads { indices: Vec<RawValue> },
    Shared {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        value: Option<RawValue>,
    },
    Private {
        label: String,
        #[serde(default)]
        value: Option<RawValue>,
    },
    Pointer {
        label: String,
        read_base: String,
        read_incr: RawValue,
        write_base: String,
        write_incr: RawValue,
    },
    Port {
        label: String,
        bank: Bank,
        number: RawValue,
    },
    /// Reference a name from an instruction in `bank`
    Resolve { name: String, bank: Bank },
    /// Reference a literal operand from an instruction in `bank`
    Constant { value: RawValue, bank: Bank },
    /// Record the initial load word of every replica of a pointer
    InitLoad { label: String, value: i64 },
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Threads { .. } => "threads".to_string(),
            Step::Shared { label, .. } => {
                format!("shared {}", label.as_deref().unwrap_or("<anonymous>"))
            }
            Step::Private { label, .. } => format!("private {label}"),
            Step::Pointer { label, .. } => format!("pointer {label}"),
            Step::Port { label, .. } => format!("port {label}"),
            Step::Resolve { name, bank } => format!("resolve {name} in bank {bank}"),
            Step::Constant { bank, .. } => format!("constant in bank {bank}"),
            Step::InitLoad { label, .. } => format!("init load of {label}"),
        }
    }
}

/// Where a resolve or constant step placed its target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub step: usize,
    pub name: String,
    pub bank: Bank,
    pub address: Address,
}

/// JSON report handed to the back end
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub resolutions: &'a [Resolution],
    pub entities: Vec<&'a Entity>,
}

pub fn load(path: &Path) -> DataResult<Vec<Step>> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> DataResult<Vec<Step>> {
    serde_json::from_str(content).map_err(|e| DataError::malformed("script", e.to_string()))
}

/// Replay `steps`, collecting failures in `reporter`
pub fn run(
    registry: &mut Registry,
    steps: &[Step],
    reporter: &mut ErrorReporter,
) -> Vec<Resolution> {
    let mut resolutions = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        debug!("Step {}: {}", number, step.describe());
        match execute(registry, step) {
            Ok(Some((name, bank, address))) => resolutions.push(Resolution {
                step: number,
                name,
                bank,
                address,
            }),
            Ok(None) => {}
            Err(err) => {
                let note = format!("in step {} ({})", number, step.describe());
                reporter.report(&err, Some(note));
            }
        }
    }
    warn_unreferenced(registry, reporter);
    info!(
        "Ran {} steps, {} resolutions, {}",
        steps.len(),
        resolutions.len(),
        reporter.summary()
    );
    resolutions
}

/// Warn once per label that was declared but never bound to a bank
fn warn_unreferenced(registry: &Registry, reporter: &mut ErrorReporter) {
    let mut warned = BTreeSet::new();
    for entity in registry.entities() {
        if let Some(label) = &entity.label {
            if !entity.is_bound() && warned.insert(label.as_str()) {
                reporter.warning(format!("{} {} is never referenced", entity.kind(), label));
            }
        }
    }
}

fn execute(registry: &mut Registry, step: &Step) -> DataResult<Option<(String, Bank, Address)>> {
    match step {
        Step::Threads { indices } => {
            let indices = indices
                .iter()
                .map(|index| literal_text("thread index", index))
                .collect::<DataResult<Vec<_>>>()?;
            registry.set_active_threads(&indices)?;
        }
        Step::Shared { label, value } => {
            registry.allocate_shared(label.as_deref(), value.as_ref())?;
        }
        Step::Private { label, value } => {
            registry.allocate_private(label, value.as_ref())?;
        }
        Step::Pointer {
            label,
            read_base,
            read_incr,
            write_base,
            write_incr,
        } => {
            let read_incr = literal_text("read increment", read_incr)?;
            let write_incr = literal_text("write increment", write_incr)?;
            registry.allocate_pointer(label, read_base, &read_incr, write_base, &write_incr)?;
        }
        Step::Port { label, bank, number } => {
            let number = literal_text("port number", number)?;
            registry.allocate_port(label, *bank, &number)?;
        }
        Step::Resolve { name, bank } => {
            let binding = registry.resolve_named(name, *bank)?;
            return Ok(Some((name.clone(), binding.bank, binding.address)));
        }
        Step::Constant { value, bank } => {
            let value = normalize(Some(value))?;
            let binding = registry.resolve_shared_value(&value, *bank)?;
            return Ok(Some((value.to_string(), binding.bank, binding.address)));
        }
        Step::InitLoad { label, value } => {
            let found = registry
                .lookup_by_name(label)?
                .ok_or_else(|| DataError::UnknownLabel {
                    label: label.clone(),
                })?;
            for id in found.ids {
                registry.set_init_load(id, *value)?;
            }
        }
    }
    Ok(None)
}

fn literal_text(what: &str, raw: &RawValue) -> DataResult<String> {
    match raw {
        RawValue::Int(value) => Ok(value.to_string()),
        RawValue::Str(text) => Ok(text.clone()),
        RawValue::List(_) => Err(DataError::malformed(what, "expected a single literal")),
    }
}
