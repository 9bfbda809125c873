//! Diverging Bar Chart Renderer
//! Draws the display set as horizontal bars around a zero line.
//!
//! Layout:
//! 1. Title and subtitle, left aligned
//! 2. Plot: one bar per department, percent change increasing upward,
//!    losers band below the dotted separator, gainers band above it
//! 3. Legend on the right: color ramp for current-term enrollment
//! 4. Caption along the bottom

use crate::stats::{DisplaySet, RankedDepartment};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// Colors
const GAIN_BAND: RGBColor = RGBColor(46, 204, 113); // Top-K shading
const LOSS_BAND: RGBColor = RGBColor(231, 76, 60); // Bottom-K shading
const LOW_ENROLLMENT: RGBColor = RGBColor(198, 219, 239); // Smallest department
const HIGH_ENROLLMENT: RGBColor = RGBColor(8, 48, 107); // Largest department
const SEPARATOR: RGBColor = RGBColor(90, 90, 90);

const BAND_OPACITY: f64 = 0.10;
const BAR_HALF_HEIGHT: f64 = 0.38;

// Layout (pixels)
const HEADER_H: u32 = 90;
const FOOTER_H: u32 = 50;
const LEGEND_W: u32 = 220;
const LABEL_AREA_W: u32 = 210;
const GRADIENT_STEPS: i32 = 40;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to draw chart: {0}")]
    Draw(String),
}

fn draw_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Draw(err.to_string())
}

/// Text and geometry of one chart.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub title: String,
    pub subtitle: String,
    pub caption: String,
    /// Legend heading; lines are separated by `\n`.
    pub legend_title: String,
    pub axis_limit: i64,
    pub width: u32,
    pub height: u32,
}

/// One bar in category-axis order (index 0 at the bottom).
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub department: String,
    pub percent_change: i64,
    /// `percent_change` clamped to the axis range.
    pub length: f64,
    pub total_current: i64,
}

impl Bar {
    pub fn is_clipped(&self) -> bool {
        self.length != self.percent_change as f64
    }
}

/// Bars in drawing order plus the position of the group divider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub bars: Vec<Bar>,
    /// Number of bottom-K bars; the divider sits just above them.
    pub bottom_len: usize,
    pub min_total: i64,
    pub max_total: i64,
}

pub struct DivergingBarRenderer;

impl DivergingBarRenderer {
    /// Render to `output`: `.svg` writes SVG, anything else a bitmap.
    pub fn render(display: &DisplaySet, spec: &ChartSpec, output: &Path) -> Result<(), RenderError> {
        if display.is_empty() {
            warn!(path = %output.display(), "no departments to chart, drawing axes only");
        }
        let layout = Self::layout(display, spec.axis_limit);
        for bar in layout.bars.iter().filter(|bar| bar.is_clipped()) {
            warn!(
                department = %bar.department,
                percent_change = bar.percent_change,
                axis_limit = spec.axis_limit,
                "bar exceeds axis range and is clipped"
            );
        }

        let is_svg = output
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("svg"))
            .unwrap_or(false);
        if is_svg {
            let root = SVGBackend::new(output, (spec.width, spec.height)).into_drawing_area();
            Self::draw(&root, &layout, spec)?;
        } else {
            let root = BitMapBackend::new(output, (spec.width, spec.height)).into_drawing_area();
            Self::draw(&root, &layout, spec)?;
        }

        info!(
            path = %output.display(),
            bars = layout.bars.len(),
            "rendered chart"
        );
        Ok(())
    }

    /// Order bars so percent change increases up the category axis: the
    /// bottom slice reversed, then the top slice reversed.
    pub fn layout(display: &DisplaySet, axis_limit: i64) -> ChartLayout {
        let limit = axis_limit as f64;
        let bars: Vec<Bar> = display
            .bottom
            .iter()
            .rev()
            .chain(display.top.iter().rev())
            .map(|d: &RankedDepartment| Bar {
                department: d.department.clone(),
                percent_change: d.percent_change,
                length: (d.percent_change as f64).clamp(-limit, limit),
                total_current: d.total_current,
            })
            .collect();

        let min_total = bars.iter().map(|b| b.total_current).min().unwrap_or(0);
        let max_total = bars.iter().map(|b| b.total_current).max().unwrap_or(0);

        ChartLayout {
            bars,
            bottom_len: display.bottom.len(),
            min_total,
            max_total,
        }
    }

    /// Linear ramp from light to dark blue over `[min, max]`.
    pub fn enrollment_color(total: i64, min: i64, max: i64) -> RGBColor {
        let t = if max > min {
            ((total - min) as f64 / (max - min) as f64).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        RGBColor(
            lerp(LOW_ENROLLMENT.0, HIGH_ENROLLMENT.0),
            lerp(LOW_ENROLLMENT.1, HIGH_ENROLLMENT.1),
            lerp(LOW_ENROLLMENT.2, HIGH_ENROLLMENT.2),
        )
    }

    fn draw<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        layout: &ChartLayout,
        spec: &ChartSpec,
    ) -> Result<(), RenderError> {
        root.fill(&WHITE).map_err(draw_error)?;

        let body_h = spec.height.saturating_sub(HEADER_H + FOOTER_H);
        let (header, rest) = root.split_vertically(HEADER_H);
        let (body, footer) = rest.split_vertically(body_h);
        let (plot_area, legend_area) = body.split_horizontally(spec.width.saturating_sub(LEGEND_W));

        Self::draw_header(&header, spec)?;
        Self::draw_plot(root, &plot_area, layout, spec)?;
        Self::draw_legend(&legend_area, layout, &spec.legend_title)?;
        Self::draw_caption(&footer, &spec.caption)?;

        root.present().map_err(draw_error)?;
        Ok(())
    }

    fn draw_header<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        spec: &ChartSpec,
    ) -> Result<(), RenderError> {
        let title_style = ("sans-serif", 30)
            .into_font()
            .style(FontStyle::Bold)
            .color(&BLACK);
        let subtitle_style = ("sans-serif", 18).into_font().color(&RGBColor(80, 80, 80));

        area.draw(&Text::new(spec.title.as_str(), (24, 18), title_style))
            .map_err(draw_error)?;
        area.draw(&Text::new(spec.subtitle.as_str(), (24, 58), subtitle_style))
            .map_err(draw_error)?;
        Ok(())
    }

    fn draw_plot<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        area: &DrawingArea<DB, Shift>,
        layout: &ChartLayout,
        spec: &ChartSpec,
    ) -> Result<(), RenderError> {
        let n = layout.bars.len();
        let limit = spec.axis_limit as f64;
        let y_top = n.max(1) as f64 - 0.5;

        let mut chart = ChartBuilder::on(area)
            .margin(16)
            .x_label_area_size(50)
            .y_label_area_size(LABEL_AREA_W)
            .build_cartesian_2d(-limit..limit, -0.5f64..y_top)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(1)
            .y_label_formatter(&|_| String::new())
            .x_labels(13)
            .x_label_formatter(&|x| format!("{:+.0}%", x))
            .x_desc("Percent change in undergraduate enrollment")
            .axis_desc_style(("sans-serif", 15))
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(draw_error)?;

        // Group bands
        let divider = layout.bottom_len as f64 - 0.5;
        if layout.bottom_len > 0 {
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(-limit, -0.5), (limit, divider)],
                    LOSS_BAND.mix(BAND_OPACITY).filled(),
                )))
                .map_err(draw_error)?;
        }
        if n > layout.bottom_len {
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(-limit, divider), (limit, y_top)],
                    GAIN_BAND.mix(BAND_OPACITY).filled(),
                )))
                .map_err(draw_error)?;
        }

        // Bars
        chart
            .draw_series(layout.bars.iter().enumerate().map(|(i, bar)| {
                let y = i as f64;
                Rectangle::new(
                    [(0.0, y - BAR_HALF_HEIGHT), (bar.length, y + BAR_HALF_HEIGHT)],
                    Self::enrollment_color(bar.total_current, layout.min_total, layout.max_total)
                        .filled(),
                )
            }))
            .map_err(draw_error)?;

        // Value annotations at bar ends
        let value_font = ("sans-serif", 13).into_font().color(&BLACK);
        chart
            .draw_series(layout.bars.iter().enumerate().map(|(i, bar)| {
                let (x, anchor) = if bar.percent_change >= 0 {
                    ((bar.length + 1.0).min(limit), HPos::Left)
                } else {
                    ((bar.length - 1.0).max(-limit), HPos::Right)
                };
                Text::new(
                    format!("{:+}%", bar.percent_change),
                    (x, i as f64),
                    value_font.pos(Pos::new(anchor, VPos::Center)),
                )
            }))
            .map_err(draw_error)?;

        // Zero reference line
        chart
            .draw_series(LineSeries::new(
                vec![(0.0, -0.5), (0.0, y_top)],
                BLACK.stroke_width(2),
            ))
            .map_err(draw_error)?;

        // Dotted divider between the gainers and the losers
        if layout.bottom_len > 0 && n > layout.bottom_len {
            let dots = 60;
            let step = 2.0 * limit / dots as f64;
            chart
                .draw_series((0..=dots).map(|j| {
                    Circle::new((-limit + j as f64 * step, divider), 2, SEPARATOR.filled())
                }))
                .map_err(draw_error)?;
        }

        // Category labels, right aligned against the plot's left edge
        let label_font = ("sans-serif", 15)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        for (i, bar) in layout.bars.iter().enumerate() {
            let (x, y) = chart.backend_coord(&(-limit, i as f64));
            root.draw(&Text::new(bar.department.as_str(), (x - 8, y), label_font.clone()))
                .map_err(draw_error)?;
        }

        Ok(())
    }

    fn draw_legend<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        layout: &ChartLayout,
        legend_title: &str,
    ) -> Result<(), RenderError> {
        let heading = ("sans-serif", 15).into_font().style(FontStyle::Bold).color(&BLACK);
        let tick = ("sans-serif", 13).into_font().color(&BLACK);

        let mut y = 40;
        for line in legend_title.lines() {
            area.draw(&Text::new(line, (16, y), heading.clone()))
                .map_err(draw_error)?;
            y += 20;
        }

        if layout.bars.is_empty() {
            return Ok(());
        }

        // Vertical ramp, largest department at the top
        let top = y + 10;
        let step_h = 6;
        let (x0, x1) = (16, 44);
        for k in 0..GRADIENT_STEPS {
            let t = 1.0 - k as f64 / (GRADIENT_STEPS - 1) as f64;
            let total = layout.min_total as f64 + t * (layout.max_total - layout.min_total) as f64;
            let color =
                Self::enrollment_color(total.round() as i64, layout.min_total, layout.max_total);
            area.draw(&Rectangle::new(
                [(x0, top + k * step_h), (x1, top + (k + 1) * step_h)],
                color.filled(),
            ))
            .map_err(draw_error)?;
        }

        let bottom = top + GRADIENT_STEPS * step_h;
        area.draw(&Text::new(layout.max_total.to_string(), (x1 + 8, top), tick.clone()))
            .map_err(draw_error)?;
        area.draw(&Text::new(
            layout.min_total.to_string(),
            (x1 + 8, bottom - 14),
            tick,
        ))
        .map_err(draw_error)?;
        Ok(())
    }

    fn draw_caption<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        caption: &str,
    ) -> Result<(), RenderError> {
        let style = ("sans-serif", 13).into_font().color(&RGBColor(110, 110, 110));
        area.draw(&Text::new(caption, (24, 16), style))
            .map_err(draw_error)?;
        Ok(())
    }
}
