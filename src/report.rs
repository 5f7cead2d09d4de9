// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/report.rs - 检测报告
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use chrono::{DateTime, Local, TimeZone};

use crate::detector::DefectRecord;

pub const NO_DEFECTS: &str = "No defects detected on this PCB.";
const REPORT_HEADER: &str = "📌 PCB Defect Detection Report";
const REPORT_SEPARATOR: &str = "--------------------------------";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// 以当前本地时间生成报告
pub fn generate_report(defects: &[DefectRecord]) -> String {
  generate_report_at(defects, &Local::now())
}

pub fn generate_report_at<Tz>(defects: &[DefectRecord], timestamp: &DateTime<Tz>) -> String
where
  Tz: TimeZone,
  Tz::Offset: std::fmt::Display,
{
  report_lines(defects, timestamp).join("\n")
}

/// 每条缺陷一行，顺序与输入一致，不做过滤或去重
pub fn report_lines<Tz>(defects: &[DefectRecord], timestamp: &DateTime<Tz>) -> Vec<String>
where
  Tz: TimeZone,
  Tz::Offset: std::fmt::Display,
{
  if defects.is_empty() {
    return vec![NO_DEFECTS.to_string()];
  }

  let mut lines = Vec::with_capacity(defects.len() + 5);
  lines.push(REPORT_HEADER.to_string());
  lines.push(format!("Date: {}", timestamp.format(TIMESTAMP_FORMAT)));
  lines.push(REPORT_SEPARATOR.to_string());
  lines.extend(
    defects
      .iter()
      .map(|d| format!("- Defect: {} (confidence: {})", d.kind, d.confidence)),
  );
  lines.push(REPORT_SEPARATOR.to_string());
  lines.push(format!("Total defects detected: {}", defects.len()));
  lines
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::detector::BoundingBox;

  fn record(kind: &str, confidence: f64) -> DefectRecord {
    DefectRecord {
      kind: kind.to_string(),
      confidence,
      bbox: BoundingBox {
        x1: 0,
        y1: 0,
        x2: 1,
        y2: 1,
      },
    }
  }

  #[test]
  fn empty_report_is_single_sentence() {
    assert_eq!(generate_report(&[]), NO_DEFECTS);
    assert_eq!(generate_report(&[]).lines().count(), 1);
  }

  #[test]
  fn report_layout() {
    let timestamp = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let defects = [record("cold_solder", 0.873), record("burn_mark", 0.5)];
    assert_eq!(
      report_lines(&defects, &timestamp),
      vec![
        "📌 PCB Defect Detection Report",
        "Date: 2026-03-14 09:26:53.000000",
        "--------------------------------",
        "- Defect: cold_solder (confidence: 0.873)",
        "- Defect: burn_mark (confidence: 0.5)",
        "--------------------------------",
        "Total defects detected: 2",
      ]
    );
  }

  #[test]
  fn duplicates_are_kept_in_order() {
    let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let defects = [
      record("short_circuit", 0.9),
      record("extra_solder", 0.3),
      record("short_circuit", 0.9),
    ];
    let report = generate_report_at(&defects, &timestamp);
    let lines: Vec<_> = report
      .lines()
      .filter(|l| l.starts_with("- Defect: "))
      .collect();
    assert_eq!(
      lines,
      vec![
        "- Defect: short_circuit (confidence: 0.9)",
        "- Defect: extra_solder (confidence: 0.3)",
        "- Defect: short_circuit (confidence: 0.9)",
      ]
    );
    assert!(report.ends_with("Total defects detected: 3"));
  }
}
