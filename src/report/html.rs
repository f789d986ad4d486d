//! Self-contained HTML report: summary counts plus a sortable table of
//! problem files. No external assets are referenced, so the document
//! renders offline.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::Local;

use super::Reporter;
use crate::types::{RiskLevel, ScanResult};

pub struct HtmlReporter;

impl Reporter for HtmlReporter {
    fn generate(&self, results: &[ScanResult], output: Option<&Path>) -> anyhow::Result<()> {
        let path = output.context("HTML reporter requires an output path")?;
        let body = render(results);
        std::fs::write(path, body)
            .with_context(|| format!("writing HTML report to {}", path.display()))?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    if size < UNIT {
        return format!("{size} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", size as f64 / div as f64, b"KMGTPE"[exp] as char)
}

fn render(results: &[ScanResult]) -> String {
    let scan_time = Local::now().format("%Y-%m-%d %H:%M:%S");

    let total = results.len();
    let mut normal = 0usize;
    let mut suspicious = 0usize;
    let mut critical = 0usize;
    let mut errors = 0usize;

    // Problem rows: everything above None, worst first.
    let mut problems: Vec<&ScanResult> = Vec::new();
    for result in results {
        if result.error.is_some() {
            errors += 1;
            continue;
        }
        match result.overall_risk {
            RiskLevel::Critical => {
                critical += 1;
                problems.push(result);
            }
            RiskLevel::High | RiskLevel::Medium | RiskLevel::Low => {
                suspicious += 1;
                problems.push(result);
            }
            _ => normal += 1,
        }
    }
    problems.sort_by(|a, b| b.overall_risk.cmp(&a.overall_risk).then(a.file.path.cmp(&b.file.path)));

    let mut rows = String::new();
    for result in &problems {
        let band = if result.overall_risk == RiskLevel::Critical {
            "critical"
        } else {
            "suspicious"
        };
        let findings = result
            .findings
            .iter()
            .map(|f| format!("{}: {}", f.analyzer, f.description))
            .collect::<Vec<_>>()
            .join("; ");
        let _ = write!(
            rows,
            r#"<tr class="{band}" data-risk="{risk}"><td>{path}</td><td>{level}</td><td>{size}</td><td>{findings}</td></tr>"#,
            band = band,
            risk = result.overall_risk.code(),
            path = escape(&result.file.path.display().to_string()),
            level = result.overall_risk.as_str(),
            size = format_size(result.file.size),
            findings = escape(&findings),
        );
    }

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>PHP Webshell Scan Report</title>
<style>
  body {{ font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #222; }}
  h1 {{ font-size: 1.4rem; }}
  .summary {{ display: flex; gap: 1rem; margin: 1rem 0; flex-wrap: wrap; }}
  .card {{ border: 1px solid #ddd; border-radius: 6px; padding: 0.8rem 1.2rem; min-width: 8rem; }}
  .card .num {{ font-size: 1.6rem; font-weight: 600; display: block; }}
  .card.critical .num {{ color: #c0392b; }}
  .card.suspicious .num {{ color: #e67e22; }}
  .card.normal .num {{ color: #27ae60; }}
  table {{ border-collapse: collapse; width: 100%; margin-top: 1rem; }}
  th, td {{ border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; font-size: 0.85rem; }}
  th {{ background: #f5f5f5; cursor: pointer; user-select: none; }}
  tr.critical td:nth-child(2) {{ color: #c0392b; font-weight: 600; }}
  tr.suspicious td:nth-child(2) {{ color: #e67e22; }}
  .meta {{ color: #777; font-size: 0.8rem; }}
</style>
</head>
<body>
<h1>PHP Webshell Scan Report</h1>
<p class="meta">Generated {scan_time} · {total} files scanned · {errors} errors</p>
<div class="summary">
  <div class="card normal"><span class="num">{normal}</span>clean</div>
  <div class="card suspicious"><span class="num">{suspicious}</span>suspicious</div>
  <div class="card critical"><span class="num">{critical}</span>malicious</div>
</div>
<table id="problems">
  <thead>
    <tr><th data-col="0">File</th><th data-col="1">Risk</th><th data-col="2">Size</th><th data-col="3">Findings</th></tr>
  </thead>
  <tbody>
{rows}
  </tbody>
</table>
<script>
document.querySelectorAll('#problems th').forEach(function (th) {{
  th.addEventListener('click', function () {{
    var table = th.closest('table');
    var body = table.querySelector('tbody');
    var col = parseInt(th.dataset.col, 10);
    var asc = th.dataset.asc !== 'true';
    th.dataset.asc = asc;
    var rows = Array.from(body.querySelectorAll('tr'));
    rows.sort(function (a, b) {{
      if (col === 1) {{
        return (parseInt(b.dataset.risk, 10) - parseInt(a.dataset.risk, 10)) * (asc ? 1 : -1);
      }}
      var x = a.cells[col].textContent, y = b.cells[col].textContent;
      return x.localeCompare(y) * (asc ? 1 : -1);
    }});
    rows.forEach(function (r) {{ body.appendChild(r); }});
  }});
}});
</script>
</body>
</html>
"##
    )
}
