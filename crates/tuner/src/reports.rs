//! Report writers: CSV rows, a JSON document per kernel, and search logs.
//!
//! Writers only format; they never mutate results. The `+∞` failure sentinel
//! renders as `-` in CSV and `null` in JSON.

use crate::result::{RunStatus, TuningResult};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};
use tuneforge_device::DeviceInfo;

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Ok => "ok",
        RunStatus::Mismatch => "mismatch",
        RunStatus::Failed => "failed",
    }
}

fn csv_time(time_ms: f64) -> String {
    if time_ms.is_finite() {
        format!("{time_ms:.3}")
    } else {
        "-".to_string()
    }
}

/// One row per result, semicolon separated, with a header row emitted
/// whenever the kernel (and hence the parameter column set) changes.
pub(crate) fn write_csv(results: &[TuningResult], sink: &mut dyn Write) -> io::Result<()> {
    let mut current_kernel: Option<&str> = None;
    for result in results {
        if current_kernel != Some(result.kernel.as_str()) {
            write!(sink, "kernel_name;time_ms;threads;status")?;
            for setting in result.configuration.settings() {
                write!(sink, ";{}", setting.name)?;
            }
            writeln!(sink)?;
            current_kernel = Some(result.kernel.as_str());
        }
        write!(
            sink,
            "{};{};{};{}",
            result.kernel,
            csv_time(result.time_ms),
            result.threads,
            status_str(result.status)
        )?;
        for setting in result.configuration.settings() {
            write!(sink, ";{}", setting.value)?;
        }
        writeln!(sink)?;
    }
    Ok(())
}

/// The JSON report for one kernel: device description, result rows, and
/// caller-supplied metadata.
pub(crate) fn json_report(
    device: &DeviceInfo,
    kernel: &str,
    results: &[TuningResult],
    meta: &BTreeMap<String, String>,
) -> Value {
    let rows: Vec<Value> = results
        .iter()
        .filter(|r| r.kernel == kernel)
        .map(|r| {
            let mut config = Map::new();
            for setting in r.configuration.settings() {
                config.insert(setting.name.clone(), json!(setting.value));
            }
            json!({
                "time_ms": if r.time_ms.is_finite() { json!(r.time_ms) } else { Value::Null },
                "status": status_str(r.status),
                "config": Value::Object(config),
            })
        })
        .collect();
    json!({
        "device": device,
        "kernel": kernel,
        "results": rows,
        "meta": meta,
    })
}
