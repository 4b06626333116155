//! SVG charts
//!
//! Every chart is rendered with plotters' SVG backend. Category and row
//! labels are placed by hand from backend coordinates so that arbitrary site
//! names stay readable regardless of mesh label spacing.

use super::summary::{
    BoxStats, PatientSlideCount, SiteProcessing, SiteStatusCount, SiteStatusProcessing,
    StatusProcessing, StatusShareRow,
};
use argo_common::MsiStatus;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use thiserror::Error;

const FONT: &str = "sans-serif";
const HEIGHT: u32 = 600;

const MSI_HIGH_COLOR: RGBColor = RGBColor(214, 39, 40);
const STABLE_COLOR: RGBColor = RGBColor(31, 119, 180);
const TOTAL_COLOR: RGBColor = RGBColor(158, 202, 225);
const PROCESSED_COLOR: RGBColor = RGBColor(49, 163, 84);
const EMPTY_CELL_COLOR: RGBColor = RGBColor(235, 235, 235);

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to render chart: {0}")]
    Render(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Render(err.to_string())
    }
}

pub type ChartResult<T> = Result<T, ChartError>;

pub fn status_color(status: MsiStatus) -> RGBColor {
    match status {
        MsiStatus::MsiHigh => MSI_HIGH_COLOR,
        MsiStatus::Stable => STABLE_COLOR,
    }
}

/// One bar per category
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub label: String,
    pub color: RGBColor,
    pub values: Vec<f64>,
    /// Text drawn above each bar
    pub annotations: Vec<Option<String>>,
}

impl BarSeries {
    pub fn new(label: impl Into<String>, color: RGBColor, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            color,
            annotations: vec![None; values.len()],
            values,
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<Option<String>>) -> Self {
        self.annotations = annotations;
        self
    }
}

/// Bar chart over named categories, series side by side or stacked
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    pub stacked: bool,
}

impl BarChart {
    pub fn render(&self, path: &Path) -> ChartResult<()> {
        let n = self.categories.len().max(1);
        let width = (n as u32 * 90 + 240).max(800);
        let y_max = if self.stacked {
            (0..self.categories.len())
                .map(|i| self.series.iter().filter_map(|s| s.values.get(i)).sum::<f64>())
                .fold(0.0, f64::max)
        } else {
            self.series
                .iter()
                .flat_map(|s| s.values.iter().copied())
                .fold(0.0, f64::max)
        };
        let y_max = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };

        let root = SVGBackend::new(path, (width, HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, (FONT, 24))
            .margin(20)
            .x_label_area_size(70)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..n as f64, 0f64..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|_| String::new())
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .draw()?;

        let bar_width = if self.stacked {
            0.8
        } else {
            0.8 / self.series.len().max(1) as f64
        };
        let annotation_style =
            TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
        let mut bases = vec![0.0; self.categories.len()];

        for (index, series) in self.series.iter().enumerate() {
            let offset = if self.stacked {
                0.1
            } else {
                0.1 + bar_width * index as f64
            };
            let color = series.color;
            let bars: Vec<(f64, f64, f64)> = series
                .values
                .iter()
                .enumerate()
                .map(|(i, &value)| {
                    let base = bases.get(i).copied().unwrap_or(0.0);
                    (i as f64 + offset, base, base + value)
                })
                .collect();

            chart
                .draw_series(bars.iter().map(|&(x0, bottom, top)| {
                    Rectangle::new([(x0, bottom), (x0 + bar_width, top)], color.filled())
                }))?
                .label(series.label.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });

            chart.draw_series(series.annotations.iter().zip(&bars).filter_map(
                |(text, &(x0, _, top))| {
                    let text = text.as_ref()?;
                    Some(Text::new(
                        text.clone(),
                        (x0 + bar_width / 2.0, top),
                        annotation_style.clone(),
                    ))
                },
            ))?;

            if self.stacked {
                for (base, &(_, _, top)) in bases.iter_mut().zip(&bars) {
                    *base = top;
                }
            }
        }

        if self.series.len() > 1 {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }

        let label_style =
            TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
        for (i, category) in self.categories.iter().enumerate() {
            let (px, py) = chart.backend_coord(&(i as f64 + 0.5, 0.0));
            root.draw(&Text::new(
                category.as_str(),
                (px, py + 8),
                label_style.clone(),
            ))?;
        }

        root.present()?;
        Ok(())
    }
}

/// Which count a site/status chart or heatmap shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Patients,
    Slides,
}

/// Patients or slides per site, stacked by MSI status
pub fn render_site_status_counts(
    path: &Path,
    counts: &[SiteStatusCount],
    kind: CountKind,
) -> ChartResult<()> {
    let mut sites: Vec<String> = counts.iter().map(|c| c.site.clone()).collect();
    sites.dedup();

    let series = MsiStatus::ALL
        .iter()
        .map(|&status| {
            let values = sites
                .iter()
                .map(|site| {
                    counts
                        .iter()
                        .find(|c| &c.site == site && c.status == status)
                        .map_or(0.0, |c| match kind {
                            CountKind::Patients => c.patients as f64,
                            CountKind::Slides => c.slides as f64,
                        })
                })
                .collect();
            BarSeries::new(status.as_str(), status_color(status), values)
        })
        .collect();

    let (title, y_desc) = match kind {
        CountKind::Patients => ("Patient Count by Site and MSI Status", "Number of Patients"),
        CountKind::Slides => ("Slide Count by Site and MSI Status", "Number of Slides"),
    };
    BarChart {
        title: title.to_string(),
        x_desc: "Site".to_string(),
        y_desc: y_desc.to_string(),
        categories: sites,
        series,
        stacked: true,
    }
    .render(path)
}

/// Share of patients per MSI status
pub fn render_status_distribution(path: &Path, shares: &[StatusShareRow]) -> ChartResult<()> {
    let categories = shares.iter().map(|s| s.status.to_string()).collect();
    let values = shares.iter().map(|s| s.count as f64).collect();
    let annotations = shares
        .iter()
        .map(|s| Some(format!("{} ({:.1}%)", s.count, s.percentage)))
        .collect();

    BarChart {
        title: "Overall MSI Status Distribution".to_string(),
        x_desc: "MSI Status".to_string(),
        y_desc: "Number of Patients".to_string(),
        categories,
        series: vec![
            BarSeries::new("Patients", STABLE_COLOR, values).with_annotations(annotations),
        ],
        stacked: false,
    }
    .render(path)
}

/// Total and processed slides per site
pub fn render_processing_by_site(path: &Path, sites: &[SiteProcessing]) -> ChartResult<()> {
    let categories = sites.iter().map(|s| s.site.clone()).collect();
    let totals = sites.iter().map(|s| s.total as f64).collect();
    let processed = sites.iter().map(|s| s.processed as f64).collect();
    let annotations = sites
        .iter()
        .map(|s| Some(format!("{:.1}%", s.percentage)))
        .collect();

    BarChart {
        title: "Slide Processing Status by Site".to_string(),
        x_desc: "Site".to_string(),
        y_desc: "Number of Slides".to_string(),
        categories,
        series: vec![
            BarSeries::new("Total", TOTAL_COLOR, totals),
            BarSeries::new("Processed", PROCESSED_COLOR, processed).with_annotations(annotations),
        ],
        stacked: false,
    }
    .render(path)
}

/// Patients with at least one processed slide, per MSI status
pub fn render_patient_processing(path: &Path, summary: &[StatusProcessing]) -> ChartResult<()> {
    let categories = summary.iter().map(|s| s.status.to_string()).collect();
    let totals = summary.iter().map(|s| s.patients as f64).collect();
    let processed = summary.iter().map(|s| s.with_processed as f64).collect();
    let annotations = summary
        .iter()
        .map(|s| Some(format!("{:.1}%", s.percentage())))
        .collect();

    BarChart {
        title: "Patients with Processed Slides by MSI Status".to_string(),
        x_desc: "MSI Status".to_string(),
        y_desc: "Number of Patients".to_string(),
        categories,
        series: vec![
            BarSeries::new("Total Patients", TOTAL_COLOR, totals),
            BarSeries::new("With Processed Slides", PROCESSED_COLOR, processed)
                .with_annotations(annotations),
        ],
        stacked: false,
    }
    .render(path)
}

/// Site × status grid of processing percentages. Rows follow `sites`.
pub fn render_processing_heatmap(
    path: &Path,
    sites: &[String],
    cells: &[SiteStatusProcessing],
    kind: CountKind,
) -> ChartResult<()> {
    let rows = sites.len().max(1);
    let columns = MsiStatus::ALL.len();
    let height = (rows as u32 * 50 + 160).max(HEIGHT);

    let root = SVGBackend::new(path, (900, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let title = match kind {
        CountKind::Slides => "Percentage of Slides Processed by Site and MSI Status",
        CountKind::Patients => {
            "Percentage of Patients with Processed Slides by Site and MSI Status"
        }
    };
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..columns as f64, 0f64..rows as f64)?;

    let mut rects = Vec::new();
    let mut labels = Vec::new();
    for (row, site) in sites.iter().enumerate() {
        let y = (rows - row - 1) as f64;
        for (column, status) in MsiStatus::ALL.iter().enumerate() {
            let x = column as f64;
            let cell = cells
                .iter()
                .find(|c| &c.site == site && c.status == *status);
            let (processed, total, pct) = match (cell, kind) {
                (Some(c), CountKind::Slides) => {
                    (c.processed_slides, c.slides, c.slide_percentage())
                }
                (Some(c), CountKind::Patients) => {
                    (c.processed_patients, c.patients, c.patient_percentage())
                }
                (None, _) => (0, 0, 0.0),
            };
            let color = if total == 0 {
                EMPTY_CELL_COLOR
            } else {
                heat_color(pct)
            };
            rects.push(Rectangle::new([(x, y), (x + 1.0, y + 1.0)], color.filled()));
            labels.push((
                format!("{:.1}% ({}/{})", pct, processed, total),
                (x + 0.5, y + 0.5),
                pct > 60.0,
            ));
        }
    }
    chart.draw_series(rects)?;

    let cell_style = |dark: bool| {
        TextStyle::from((FONT, 14).into_font())
            .color(if dark { &WHITE } else { &BLACK })
            .pos(Pos::new(HPos::Center, VPos::Center))
    };
    chart.draw_series(
        labels
            .into_iter()
            .map(|(text, coord, dark)| Text::new(text, coord, cell_style(dark))),
    )?;

    let column_style =
        TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
    for (column, status) in MsiStatus::ALL.iter().enumerate() {
        let (px, py) = chart.backend_coord(&(column as f64 + 0.5, 0.0));
        root.draw(&Text::new(status.as_str(), (px, py + 8), column_style.clone()))?;
    }

    let row_style =
        TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Right, VPos::Center));
    for (row, site) in sites.iter().enumerate() {
        let y = (rows - row - 1) as f64 + 0.5;
        let (px, py) = chart.backend_coord(&(0.0, y));
        root.draw(&Text::new(site.as_str(), (px - 8, py), row_style.clone()))?;
    }

    root.present()?;
    Ok(())
}

/// White to green by percentage
fn heat_color(percentage: f64) -> RGBColor {
    let t = (percentage / 100.0).clamp(0.0, 1.0);
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    RGBColor(lerp(247, 8), lerp(252, 104), lerp(240, 172))
}

/// Box plot of slides per patient, one box per MSI status
pub fn render_slides_per_patient(path: &Path, rows: &[PatientSlideCount]) -> ChartResult<()> {
    let groups: Vec<(MsiStatus, Vec<f64>)> = MsiStatus::ALL
        .iter()
        .map(|&status| {
            let values = rows
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.slides as f64)
                .collect();
            (status, values)
        })
        .filter(|(_, values): &(MsiStatus, Vec<f64>)| !values.is_empty())
        .collect();

    let y_max = rows.iter().map(|r| r.slides).max().unwrap_or(1) as f64 * 1.1 + 0.5;
    let n = groups.len().max(1);

    let root = SVGBackend::new(path, (800, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Slides per Patient by MSI Status", (FONT, 24))
        .margin(20)
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..n as f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .x_desc("MSI Status")
        .y_desc("Number of Slides")
        .draw()?;

    let label_style =
        TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Top));

    for (i, (status, values)) in groups.iter().enumerate() {
        let Some(stats) = BoxStats::from_values(values) else {
            continue;
        };
        let center = i as f64 + 0.5;
        let half = 0.2;
        let color = status_color(*status);

        let left = center - half;
        let right = center + half;
        let cap = half / 2.0;
        let thin = BLACK.stroke_width(1);

        chart.draw_series([
            Rectangle::new([(left, stats.q1), (right, stats.q3)], color.mix(0.35).filled()),
            Rectangle::new([(left, stats.q1), (right, stats.q3)], thin),
        ])?;
        chart.draw_series([
            PathElement::new(
                vec![(left, stats.median), (right, stats.median)],
                BLACK.stroke_width(2),
            ),
            PathElement::new(vec![(center, stats.lower_whisker), (center, stats.q1)], thin),
            PathElement::new(vec![(center, stats.q3), (center, stats.upper_whisker)], thin),
            PathElement::new(
                vec![
                    (center - cap, stats.lower_whisker),
                    (center + cap, stats.lower_whisker),
                ],
                thin,
            ),
            PathElement::new(
                vec![
                    (center - cap, stats.upper_whisker),
                    (center + cap, stats.upper_whisker),
                ],
                thin,
            ),
        ])?;
        chart.draw_series(values.iter().enumerate().map(|(j, &value)| {
            let style = if stats.is_outlier(value) {
                BLACK.filled()
            } else {
                color.mix(0.7).filled()
            };
            Circle::new((center + jitter(j) * half, value), 3, style)
        }))?;

        let (px, py) = chart.backend_coord(&(center, 0.0));
        root.draw(&Text::new(
            format!("{} (n = {})", status, stats.n),
            (px, py + 8),
            label_style.clone(),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Deterministic horizontal spread in [-0.5, 0.5)
fn jitter(index: usize) -> f64 {
    ((index * 37) % 17) as f64 / 17.0 - 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn counts() -> Vec<SiteStatusCount> {
        vec![
            SiteStatusCount {
                site: "siteA".to_string(),
                status: MsiStatus::MsiHigh,
                patients: 3,
                slides: 5,
            },
            SiteStatusCount {
                site: "siteA".to_string(),
                status: MsiStatus::Stable,
                patients: 7,
                slides: 9,
            },
            SiteStatusCount {
                site: "siteB".to_string(),
                status: MsiStatus::Stable,
                patients: 2,
                slides: 2,
            },
        ]
    }

    #[test]
    fn test_site_status_chart_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slide_count_by_site.svg");
        render_site_status_counts(&path, &counts(), CountKind::Slides).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("siteB"));
    }

    #[test]
    fn test_heatmap_labels_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heatmap.svg");
        let cells = vec![SiteStatusProcessing {
            site: "siteA".to_string(),
            status: MsiStatus::MsiHigh,
            slides: 10,
            processed_slides: 4,
            patients: 5,
            processed_patients: 3,
        }];
        let sites = ["siteA".to_string()];
        render_processing_heatmap(&path, &sites, &cells, CountKind::Slides).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("40.0% (4/10)"));
        assert!(svg.contains("0.0% (0/0)"));
    }

    #[test]
    fn test_box_plot_handles_single_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slides_per_patient.svg");
        let rows = vec![
            PatientSlideCount {
                patient_id: "P1".to_string(),
                status: MsiStatus::Stable,
                slides: 1,
            },
            PatientSlideCount {
                patient_id: "P2".to_string(),
                status: MsiStatus::Stable,
                slides: 4,
            },
        ];
        render_slides_per_patient(&path, &rows).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("MSS (n = 2)"));
    }

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(247, 252, 240));
        assert_eq!(heat_color(100.0), RGBColor(8, 104, 172));
    }
}
