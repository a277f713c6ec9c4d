use chrono::Utc;
use serde::Serialize;

use crate::config::settings::OutputFormat;
use crate::devices::profiles::RegisterProfile;
use crate::devices::tstat7;
use crate::modbus::PortSummary;
use crate::services::{
    FileWriteReport, FixReport, MoveOutcome, RegisterReadResult, ScanReport, VerifyReport, WriteSummary,
};

/// Renders operation results for stdout. Progress goes to the log, not here.
pub trait ReportFormatter: Send + Sync {
    fn format_scan(&self, report: &ScanReport) -> String;
    fn format_move(&self, outcome: &MoveOutcome) -> String;
    fn format_reads(&self, slave_id: u8, results: &[RegisterReadResult]) -> String;
    fn format_write(&self, summary: &WriteSummary) -> String;
    fn format_file_write(&self, slave_id: u8, report: &FileWriteReport) -> String;
    fn format_verify(&self, report: &VerifyReport) -> String;
    fn format_fix(&self, report: &FixReport) -> String;
    fn format_profiles(&self, profiles: &[&RegisterProfile]) -> String;
    fn format_ports(&self, ports: &[PortSummary]) -> String;
}

pub fn formatter_for(format: OutputFormat) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::Console => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

pub struct ConsoleFormatter;

impl ReportFormatter for ConsoleFormatter {
    fn format_scan(&self, report: &ScanReport) -> String {
        let mut output = format!("Scan {}-{}:\n", report.start, report.end);
        for address in report.start..=report.end {
            match report.found.iter().find(|hit| hit.address == address) {
                Some(hit) => output.push_str(&format!(
                    "Addr: {}    Value: {} ({})\n",
                    hit.address,
                    hit.model_code,
                    tstat7::describe_model(hit.model_code)
                )),
                None if report.free.contains(&address) => {
                    output.push_str(&format!("Addr: {}    Not Found\n", address))
                }
                None => {}
            }
        }
        output.push_str(&format!(
            "Found {} device(s), {} address(es) free, took {:.1}s\n",
            report.found.len(),
            report.free.len(),
            report.elapsed_ms as f64 / 1000.0
        ));
        output
    }

    fn format_move(&self, outcome: &MoveOutcome) -> String {
        match outcome {
            MoveOutcome::Moved { from, to } => format!("Moved tstat {} to {}\n", from, to),
            MoveOutcome::Aborted { from, to } => format!("Move of tstat {} to {} aborted\n", from, to),
        }
    }

    fn format_reads(&self, _slave_id: u8, results: &[RegisterReadResult]) -> String {
        let mut output = String::new();
        for result in results {
            match &result.error {
                None => {
                    let values: Vec<String> = result.values.iter().map(|v| v.to_string()).collect();
                    output.push_str(&format!("Reg: {}    Value: {}\n", result.address, values.join(", ")));
                }
                Some(e) => output.push_str(&format!("Reg: {}    Error: {}\n", result.address, e)),
            }
        }
        output
    }

    fn format_write(&self, summary: &WriteSummary) -> String {
        let mut output = format!("tstat {}: {} done\n", summary.slave_id, summary.action);
        for entry in &summary.writes {
            output.push_str(&format!("  wrote {}\n", entry));
        }
        output
    }

    fn format_file_write(&self, slave_id: u8, report: &FileWriteReport) -> String {
        let mut output = format!(
            "tstat {}: {} register(s) written from {}\n",
            slave_id,
            report.written.len(),
            report.path
        );
        for entry in &report.failed {
            output.push_str(&format!("  failed {}\n", entry));
        }
        for skipped in &report.skipped {
            output.push_str(&format!("  skipped line {}: {}\n", skipped.line, skipped.content));
        }
        output
    }

    fn format_verify(&self, report: &VerifyReport) -> String {
        let mut output = format!("Verify tstat {} against {}\n", report.slave_id, report.profile);

        output.push_str("Matching registers:\n");
        let matching: Vec<String> = report.matching.iter().map(|e| e.to_string()).collect();
        output.push_str(&format!("[{}]\n", matching.join(", ")));

        output.push_str("Non matching registers:\n");
        let non_matching: Vec<String> = report
            .non_matching
            .iter()
            .map(|m| format!("[{}, {}] (read {})", m.address, m.expected, m.actual))
            .collect();
        output.push_str(&format!("[{}]\n", non_matching.join(", ")));

        if !report.unreadable.is_empty() {
            output.push_str("Unreadable registers:\n");
            for u in &report.unreadable {
                output.push_str(&format!("[{}, {}] {}\n", u.address, u.expected, u.error));
            }
        }
        output
    }

    fn format_fix(&self, report: &FixReport) -> String {
        let mut output = format!(
            "Fix tstat {} with {}: {} written, {} failed\n",
            report.slave_id,
            report.profile,
            report.written.len(),
            report.failed.len()
        );
        for entry in &report.failed {
            output.push_str(&format!("  failed {}\n", entry));
        }
        output
    }

    fn format_profiles(&self, profiles: &[&RegisterProfile]) -> String {
        let mut output = String::from("Available profiles:\n");
        for profile in profiles {
            output.push_str(&format!(
                "  {:<16} {:>3} registers  {}\n",
                profile.name,
                profile.len(),
                profile.description
            ));
        }
        output
    }

    fn format_ports(&self, ports: &[PortSummary]) -> String {
        if ports.is_empty() {
            return "No serial ports found\n".to_string();
        }
        let mut output = String::from("Available serial ports:\n");
        for port in ports {
            output.push_str(&format!("  {} ({})", port.name, port.kind));
            if let Some(manufacturer) = &port.manufacturer {
                output.push_str(&format!(" {}", manufacturer));
            }
            if let Some(serial) = &port.serial_number {
                output.push_str(&format!(" S/N {}", serial));
            }
            output.push('\n');
        }
        output
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    fn envelope<T: Serialize + ?Sized>(&self, operation: &str, result: &T) -> String {
        let value = serde_json::json!({
            "operation": operation,
            "timestamp": Utc::now().to_rfc3339(),
            "result": result,
        });
        let mut output = serde_json::to_string_pretty(&value).unwrap_or_default();
        output.push('\n');
        output
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_scan(&self, report: &ScanReport) -> String {
        self.envelope("scan", report)
    }

    fn format_move(&self, outcome: &MoveOutcome) -> String {
        self.envelope("move", outcome)
    }

    fn format_reads(&self, slave_id: u8, results: &[RegisterReadResult]) -> String {
        self.envelope(
            "read",
            &serde_json::json!({ "slave_id": slave_id, "registers": results }),
        )
    }

    fn format_write(&self, summary: &WriteSummary) -> String {
        self.envelope("write", summary)
    }

    fn format_file_write(&self, slave_id: u8, report: &FileWriteReport) -> String {
        self.envelope(
            "read_file",
            &serde_json::json!({ "slave_id": slave_id, "report": report }),
        )
    }

    fn format_verify(&self, report: &VerifyReport) -> String {
        self.envelope("verify", report)
    }

    fn format_fix(&self, report: &FixReport) -> String {
        self.envelope("fix", report)
    }

    fn format_profiles(&self, profiles: &[&RegisterProfile]) -> String {
        self.envelope("list_profiles", profiles)
    }

    fn format_ports(&self, ports: &[PortSummary]) -> String {
        self.envelope("list_ports", ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::profiles::RegisterEntry;
    use crate::devices::tstat7::ThermostatModel;
    use crate::services::{Mismatch, ScanHit};

    fn verify_report() -> VerifyReport {
        VerifyReport {
            profile: "test".to_string(),
            slave_id: 4,
            matching: vec![RegisterEntry::new(142, 20)],
            non_matching: vec![Mismatch {
                address: 143,
                expected: 20,
                actual: 5,
            }],
            unreadable: Vec::new(),
        }
    }

    #[test]
    fn test_console_verify_lists_both_groups() {
        let output = ConsoleFormatter.format_verify(&verify_report());
        assert!(output.contains("Matching registers:\n[[142, 20]]"));
        assert!(output.contains("Non matching registers:\n[[143, 20] (read 5)]"));
        assert!(!output.contains("Unreadable"));
    }

    #[test]
    fn test_json_verify_is_parseable() {
        let output = JsonFormatter.format_verify(&verify_report());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["operation"], "verify");
        assert_eq!(value["result"]["matching"][0]["address"], 142);
        assert_eq!(value["result"]["non_matching"][0]["actual"], 5);
    }

    #[test]
    fn test_console_reads_show_errors_inline() {
        let results = vec![
            RegisterReadResult {
                address: 7,
                values: vec![93],
                error: None,
            },
            RegisterReadResult {
                address: 8,
                values: Vec::new(),
                error: Some("Timeout".to_string()),
            },
        ];
        let output = ConsoleFormatter.format_reads(4, &results);
        assert_eq!(output, "Reg: 7    Value: 93\nReg: 8    Error: Timeout\n");
    }

    #[test]
    fn test_json_move_outcome_is_tagged() {
        let output = JsonFormatter.format_move(&MoveOutcome::Moved { from: 3, to: 8 });
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["result"]["outcome"], "moved");
        assert_eq!(value["result"]["to"], 8);
    }

    #[test]
    fn test_console_scan_lists_every_address() {
        let report = ScanReport {
            start: 1,
            end: 3,
            found: vec![ScanHit {
                address: 2,
                model_code: 93,
                model: Some(ThermostatModel::Tstat7),
            }],
            free: vec![1, 3],
            elapsed_ms: 250,
        };
        let output = ConsoleFormatter.format_scan(&report);
        assert!(output.contains(
            "Addr: 1    Not Found\nAddr: 2    Value: 93 (TSTAT7)\nAddr: 3    Not Found\n"
        ));
        assert!(output.contains("Found 1 device(s), 2 address(es) free"));
    }

    #[test]
    fn test_formatter_for() {
        let console = formatter_for(OutputFormat::Console);
        assert!(console.format_ports(&[]).contains("No serial ports"));
        let json = formatter_for(OutputFormat::Json);
        assert!(json.format_ports(&[]).starts_with('{'));
    }
}
