//! Streaming output helpers for reports and command plans (made for wheelsmith)

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::pipeline::BuildReport;
use crate::runner::CommandSpec;

/// Write any serializable value as prettified JSON.
pub fn write_json_pretty<T: Serialize + ?Sized>(value: &T, mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write items as newline-delimited JSON (NDJSON).
pub fn write_ndjson<T: Serialize>(items: &[T], mut w: impl Write) -> Result<()> {
    for item in items {
        let line = serde_json::to_string(item)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// One line per artifact left in the output directory, portable ones marked.
pub fn write_report_plain(report: &BuildReport, mut w: impl Write) -> Result<()> {
    for artifact in &report.artifacts {
        let marker = if artifact.portable { "portable" } else { "host" };
        writeln!(w, "{}\t{}", marker, artifact.path.display())?;
    }
    Ok(())
}

/// Echo lines, one per planned command.
pub fn write_commands_plain(commands: &[CommandSpec], mut w: impl Write) -> Result<()> {
    for spec in commands {
        writeln!(w, "{spec}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ArtifactSummary;
    use crate::runner::CommandRecord;
    use crate::wheel::WheelName;
    use std::path::PathBuf;

    fn sample_report() -> BuildReport {
        let name = "ext-1.0-cp36-cp36m-manylinux1_x86_64.whl";
        BuildReport {
            toolchain: Some("nightly-2019-02-04".to_string()),
            interpreters: Vec::new(),
            repaired: vec![PathBuf::from("/io/dist/ext-1.0-cp36-cp36m-linux_x86_64.whl")],
            artifacts: vec![
                ArtifactSummary {
                    path: PathBuf::from("/io/dist/ext-1.0-cp36-cp36m-linux_x86_64.whl"),
                    wheel: WheelName::parse("ext-1.0-cp36-cp36m-linux_x86_64.whl").ok(),
                    portable: false,
                },
                ArtifactSummary {
                    path: PathBuf::from(format!("/io/dist/{name}")),
                    wheel: WheelName::parse(name).ok(),
                    portable: true,
                },
            ],
        }
    }

    #[test]
    fn ndjson_writes_one_line_per_artifact() {
        let report = sample_report();
        let mut buf = Vec::new();

        write_ndjson(&report.artifacts, &mut buf).expect("write ndjson");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: ArtifactSummary = serde_json::from_str(lines[1]).expect("parse");
        assert!(parsed.portable);
        assert_eq!(
            parsed.wheel.map(|w| w.platform_tag),
            Some("manylinux1_x86_64".to_string())
        );
    }

    #[test]
    fn plain_report_marks_portable_artifacts() {
        let mut buf = Vec::new();
        write_report_plain(&sample_report(), &mut buf).expect("write");

        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("host\t/io/dist/ext-1.0-cp36-cp36m-linux_x86_64.whl\n"));
        assert!(text.contains("portable\t/io/dist/ext-1.0-cp36-cp36m-manylinux1_x86_64.whl"));
    }

    #[test]
    fn command_plan_serializes_argv() {
        let spec = CommandSpec::new("rustup").args(["default", "nightly-2019-02-04"]);
        let mut buf = Vec::new();
        write_json_pretty(&[spec.to_record()], &mut buf).expect("write");

        let parsed: Vec<CommandRecord> = serde_json::from_slice(&buf).expect("parse");
        assert_eq!(parsed[0].argv, vec!["rustup", "default", "nightly-2019-02-04"]);
    }
}
