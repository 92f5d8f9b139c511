//! SVG histogram rendering.

use super::{format_percent, DistributionReport, Histogram, ReportSink};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 600.0;
const LEFT_PAD: f64 = 70.0;
const RIGHT_PAD: f64 = 30.0;
const TOP_PAD: f64 = 50.0;
const BOTTOM_PAD: f64 = 60.0;
const TICKS: usize = 5;

const BAR_COLOR: &str = "#6495ed";
const VAR_COLOR: &str = "#ff0000";
const CVAR_COLOR: &str = "#8b0000";

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 50;

/// Writes `<out_dir>/<label>_risk_profile.svg` for every report.
#[derive(Debug, Clone)]
pub struct SvgHistogramSink {
    out_dir: PathBuf,
    bins: usize,
}

impl SvgHistogramSink {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            bins: DEFAULT_BINS,
        }
    }

    /// Use a different number of histogram bins.
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins.max(1);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Output path for a portfolio label.
    pub fn path_for(&self, label: &str) -> PathBuf {
        let stem: String = label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.out_dir.join(format!("{}_risk_profile.svg", stem))
    }

    /// Render a report to an SVG document.
    pub fn render_svg(&self, report: &DistributionReport<'_>) -> String {
        let hist = Histogram::from_values(report.returns.values(), self.bins);

        let mut x_min = hist.min();
        let mut x_max = hist.max();
        for threshold in [report.var, report.cvar] {
            if threshold.is_finite() {
                x_min = x_min.min(threshold);
                x_max = x_max.max(threshold);
            }
        }
        let y_max = hist.max_count().max(1) as f64;

        let plot_w = WIDTH - LEFT_PAD - RIGHT_PAD;
        let plot_h = HEIGHT - TOP_PAD - BOTTOM_PAD;
        let x_of = |v: f64| LEFT_PAD + (v - x_min) / (x_max - x_min) * plot_w;
        let y_of = |c: f64| TOP_PAD + (1.0 - c / y_max) * plot_h;
        let baseline = y_of(0.0);

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}"><style>text{{font-family:Arial,sans-serif;font-size:12px;fill:#333}}</style>"#,
            w = WIDTH,
            h = HEIGHT
        ));
        svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff" />"##);

        // Grid and y ticks
        for i in 0..=TICKS {
            let count = y_max * i as f64 / TICKS as f64;
            let y = y_of(count);
            svg.push_str(&format!(
                r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#000000" stroke-opacity="0.3" stroke-width="0.5" />"##,
                x1 = LEFT_PAD,
                x2 = LEFT_PAD + plot_w,
                y = y
            ));
            svg.push_str(&format!(
                r##"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{label:.0}</text>"##,
                x = LEFT_PAD - 6.0,
                y = y + 4.0,
                label = count
            ));
        }

        // X ticks
        for i in 0..=TICKS {
            let value = x_min + (x_max - x_min) * i as f64 / TICKS as f64;
            let x = x_of(value);
            svg.push_str(&format!(
                r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="#000000" stroke-opacity="0.3" stroke-width="0.5" />"##,
                x = x,
                y1 = TOP_PAD,
                y2 = baseline
            ));
            svg.push_str(&format!(
                r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"##,
                x = x,
                y = baseline + 18.0,
                label = format_percent(value)
            ));
        }

        // Bars
        for (i, &count) in hist.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let x0 = x_of(hist.edges[i]);
            let x1 = x_of(hist.edges[i + 1]);
            let top = y_of(count as f64);
            svg.push_str(&format!(
                r##"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{color}" fill-opacity="0.75" stroke="#000000" stroke-width="0.5" />"##,
                x = x0,
                y = top,
                w = (x1 - x0).max(0.5),
                h = baseline - top,
                color = BAR_COLOR
            ));
        }

        // Thresholds
        let mut legend = vec![LegendEntry::bar("Daily Returns")];
        if report.var.is_finite() {
            push_vline(&mut svg, x_of(report.var), VAR_COLOR, true, baseline);
            legend.push(LegendEntry::line(report.var_label(), VAR_COLOR, true));
        }
        if report.cvar.is_finite() {
            push_vline(&mut svg, x_of(report.cvar), CVAR_COLOR, false, baseline);
            legend.push(LegendEntry::line(report.cvar_label(), CVAR_COLOR, false));
        }
        draw_legend(&mut svg, &legend);

        // Title and axis labels
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" style="font-size:16px">{title}</text>"##,
            x = WIDTH / 2.0,
            y = TOP_PAD - 20.0,
            title = escape_xml(&report.title())
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">Daily Return</text>"##,
            x = LEFT_PAD + plot_w / 2.0,
            y = HEIGHT - 15.0
        ));
        svg.push_str(&format!(
            r##"<text x="20" y="{y:.2}" text-anchor="middle" transform="rotate(-90 20 {y:.2})">Frequency</text>"##,
            y = TOP_PAD + plot_h / 2.0
        ));

        svg.push_str("</svg>");
        svg
    }
}

impl ReportSink for SvgHistogramSink {
    fn render(&mut self, report: &DistributionReport<'_>) -> Result<Option<PathBuf>> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.path_for(report.label);
        fs::write(&path, self.render_svg(report))?;
        tracing::info!("Plot saved as {}", path.display());
        Ok(Some(path))
    }
}

struct LegendEntry {
    label: String,
    color: &'static str,
    dash: bool,
    bar: bool,
}

impl LegendEntry {
    fn bar(label: &str) -> Self {
        Self {
            label: label.to_string(),
            color: BAR_COLOR,
            dash: false,
            bar: true,
        }
    }

    fn line(label: String, color: &'static str, dash: bool) -> Self {
        Self {
            label,
            color,
            dash,
            bar: false,
        }
    }
}

fn push_vline(svg: &mut String, x: f64, color: &str, dash: bool, baseline: f64) {
    let dash = if dash { "6 4" } else { "0" };
    svg.push_str(&format!(
        r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="{color}" stroke-width="2" stroke-dasharray="{dash}" />"##,
        x = x,
        y1 = TOP_PAD,
        y2 = baseline,
        color = color,
        dash = dash
    ));
}

fn draw_legend(svg: &mut String, entries: &[LegendEntry]) {
    let x = LEFT_PAD + 12.0;
    let mut y = TOP_PAD + 18.0;
    for entry in entries {
        if entry.bar {
            svg.push_str(&format!(
                r##"<rect x="{x:.2}" y="{y:.2}" width="20" height="10" fill="{color}" fill-opacity="0.75" stroke="#000000" stroke-width="0.5" />"##,
                x = x,
                y = y - 9.0,
                color = entry.color
            ));
        } else {
            let dash = if entry.dash { "6 4" } else { "0" };
            svg.push_str(&format!(
                r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="2" stroke-dasharray="{dash}" />"##,
                x1 = x,
                x2 = x + 20.0,
                y = y - 4.0,
                color = entry.color,
                dash = dash
            ));
        }
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="start">{label}</text>"##,
            x = x + 26.0,
            y = y,
            label = escape_xml(&entry.label)
        ));
        y += 18.0;
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReturnSeries;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn returns() -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let values: Vec<f64> = (0..120).map(|i| ((i as f64) * 0.9).sin() * 0.02).collect();
        let dates = (0..values.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        ReturnSeries::new(dates, values).unwrap()
    }

    fn report<'a>(label: &'a str, series: &'a ReturnSeries, cvar: f64) -> DistributionReport<'a> {
        DistributionReport {
            label,
            returns: series,
            var: -0.018,
            cvar,
            sample_size: 121,
            confidence: 0.95,
        }
    }

    #[test]
    fn test_render_writes_file() {
        let dir = tempdir().unwrap();
        let mut sink = SvgHistogramSink::new(dir.path().join("outputs"));
        let series = returns();

        let path = sink
            .render(&report("Tech_Portfolio", &series, -0.019))
            .unwrap()
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("outputs").join("Tech_Portfolio_risk_profile.svg")
        );
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.ends_with("</svg>"));
        assert!(content.contains("Historical Distribution: Tech_Portfolio (Last 121 Trading Days)"));
        assert!(content.contains("VaR 95%: -1.80% (|Loss|=1.80%)"));
        assert!(content.contains("CVaR 95%: -1.90% (|Loss|=1.90%)"));
        assert!(content.contains("Daily Returns"));
    }

    #[test]
    fn test_undefined_cvar_skips_line() {
        let series = returns();
        let svg = SvgHistogramSink::new("unused").render_svg(&report("P", &series, f64::NAN));

        assert!(svg.contains("VaR 95%"));
        assert!(!svg.contains("CVaR"));
    }

    #[test]
    fn test_label_is_escaped_and_path_sanitised() {
        let series = returns();
        let sink = SvgHistogramSink::new("out").with_bins(10);
        let svg = sink.render_svg(&report("R&D <Growth>", &series, -0.02));

        assert!(svg.contains("R&amp;D &lt;Growth&gt;"));
        assert_eq!(
            sink.path_for("R&D <Growth>"),
            Path::new("out").join("R_D__Growth__risk_profile.svg")
        );
    }

    #[test]
    fn test_bar_count_matches_bins() {
        let series = returns();
        let sink = SvgHistogramSink::new("out").with_bins(8);
        let svg = sink.render_svg(&report("P", &series, -0.02));

        let hist = Histogram::from_values(series.values(), 8);
        let non_empty = hist.counts.iter().filter(|&&c| c > 0).count();
        // One rect for the background, one for the legend swatch.
        assert_eq!(svg.matches("<rect").count(), non_empty + 2);
    }
}
