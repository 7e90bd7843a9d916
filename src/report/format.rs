//! Plain-text run summary.

use std::ops::RangeInclusive;

use crate::app::pipeline::{Failure, RunOutput};
use crate::domain::{ChangepointFit, DiscrepancySeries, EstimatorOutput, ReconConfig};
use crate::math::mean;

/// Number of break years listed per changepoint.
const TOP_MASS_YEARS: usize = 5;

/// Format the full run summary (inputs, estimates, discrepancies, changepoints).
pub fn format_run_summary(run: &RunOutput, config: &ReconConfig) -> String {
    let r = &run.reconciliation;
    let mut out = String::new();

    out.push_str("=== recon - population estimate reconciliation ===\n");
    out.push_str(&format!("Data dir: {}\n", config.data_dir.display()));
    out.push_str(&format!(
        "Official: n={} | years={}\n",
        r.official.len(),
        fmt_span(r.official.span().as_ref())
    ));
    if !r.fallbacks.is_empty() {
        let names: Vec<&str> = r.fallbacks.iter().map(|k| k.name()).collect();
        out.push_str(&format!("Fallbacks: {}\n", names.join(", ")));
    }
    if !run.load.row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", run.load.row_errors.len()));
    }

    out.push_str("\nEstimates:\n");
    for e in &r.estimates {
        out.push_str(&format_estimate(e));
    }

    out.push_str("\nDiscrepancies (official - estimate):\n");
    for d in &r.discrepancies {
        out.push_str(&format_discrepancy(d));
    }

    if !r.changepoints.is_empty() {
        out.push_str("\nChangepoints:\n");
        for fit in &r.changepoints {
            out.push_str(&format_changepoint(fit));
        }
    }

    if !r.failures.is_empty() {
        out.push_str("\nFailures:\n");
        for f in &r.failures {
            out.push_str(&format_failure(f));
        }
    }

    out
}

fn format_estimate(e: &EstimatorOutput) -> String {
    let mut line = format!(
        "- {:<14} n={:<4} years={}",
        e.id.as_str(),
        e.series.len(),
        fmt_span(e.series.span().as_ref())
    );
    if !e.quality.dropped_years.is_empty() {
        line.push_str(&format!(" | dropped={}", e.quality.dropped_years.len()));
    }
    if !e.quality.imputed_years.is_empty() {
        line.push_str(&format!(" | imputed={}", e.quality.imputed_years.len()));
    }
    line.push('\n');
    line
}

fn format_discrepancy(d: &DiscrepancySeries) -> String {
    let values: Vec<f64> = d.series.values().collect();
    let last = d.series.iter().last();
    format!(
        "- {:<22} n={:<4} years={} | mean={} | last={}\n",
        d.label(),
        values.len(),
        fmt_span(d.series.span().as_ref()),
        fmt_num(mean(&values)),
        last.map(|(y, v)| format!("{} ({y})", fmt_num(v)))
            .unwrap_or_else(|| "-".to_string())
    )
}

fn format_changepoint(fit: &ChangepointFit) -> String {
    let s = &fit.summary;
    let mut out = String::new();

    out.push_str(&format!(
        "- {}: tau mode {} | mean {:.1} | {:.0}% HDI [{}, {}]\n",
        fit.series,
        s.tau_mode,
        s.tau_mean,
        s.hdi_prob * 100.0,
        s.tau_hdi.0,
        s.tau_hdi.1
    ));
    out.push_str(&format!(
        "  alpha1={} alpha2={} sigma={} | max R-hat={:.3}\n",
        fmt_num(s.alpha1_mean),
        fmt_num(s.alpha2_mean),
        fmt_num(s.sigma_mean),
        s.r_hat.max()
    ));

    let mut mass: Vec<(i32, f64)> = s.tau_mass.iter().map(|(&y, &p)| (y, p)).collect();
    mass.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let top: Vec<String> = mass
        .iter()
        .take(TOP_MASS_YEARS)
        .map(|(y, p)| format!("{y}:{:.1}%", p * 100.0))
        .collect();
    out.push_str(&format!("  P(tau): {}\n", top.join(" ")));

    let accept: Vec<String> = fit
        .posterior
        .chain_stats
        .iter()
        .map(|c| format!("{:.2}", c.sigma_accept_rate))
        .collect();
    out.push_str(&format!("  sigma acceptance per chain: {}\n", accept.join(" ")));

    out
}

fn format_failure(f: &Failure) -> String {
    format!(
        "- [{}] {} (years {}): {}\n",
        f.stage.as_str(),
        f.subject,
        fmt_span(f.span.as_ref()),
        f.error
    )
}

fn fmt_span(span: Option<&RangeInclusive<i32>>) -> String {
    match span {
        Some(r) => format!("{}-{}", r.start(), r.end()),
        None => "-".to_string(),
    }
}

/// Population-scale numbers read best in millions.
fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "-".to_string();
    }
    if v.abs() >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else {
        format!("{v:.2}")
    }
}
