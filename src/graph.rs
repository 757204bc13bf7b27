#![cfg(not(tarpaulin_include))]
use crate::chart::{CategoryPoint, ChartData, ChartKind, ChartSpec, Series, TreeLeaf};
use crate::error::{DashboardError, Result};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::f64::consts::PI;
use std::io::Cursor;

type DrawResult<T> = std::result::Result<T, Box<dyn Error>>;

/// Turns a chart description into a raster image
///
/// The dashboard never owns pixels itself; anything able to produce PNG
/// bytes for a `ChartSpec` can back the report exporter.
pub trait ChartRasterizer {
    /// Render `spec` as a PNG of `width` x `height` pixels.
    fn rasterize(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>>;
}

/// Rasterizer backed by the plotters bitmap backend
///
/// # Implementation Notes
/// * Draws into an in-memory RGB buffer, so concurrent exports never share
///   a scratch file
/// * Encodes the buffer as PNG with the `image` crate
/// * Text needs a system sans-serif font; a missing font surfaces as an
///   `Export` error, never a panic
#[derive(Clone, Copy, Debug, Default)]
pub struct PlottersRasterizer;

impl ChartRasterizer for PlottersRasterizer {
    fn rasterize(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>> {
        render_png(spec, width, height).map_err(|e| {
            DashboardError::Export(format!("could not render chart {:?}: {}", spec.title, e))
        })
    }
}

/// Renders a chart to PNG bytes
///
/// Dispatches on the chart kind; a kind paired with the wrong data shape
/// is reported as an error instead of being drawn.
///
/// # Arguments
/// * `spec` - Chart to draw
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
fn render_png(spec: &ChartSpec, width: u32, height: u32) -> DrawResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err("chart dimensions must be non-zero".into());
    }

    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        match (spec.kind, &spec.data) {
            (ChartKind::Bar, ChartData::Points(points)) => draw_bars(&root, spec, points)?,
            (ChartKind::Scatter, ChartData::Points(points)) => draw_scatter(&root, spec, points)?,
            (ChartKind::Pie, ChartData::Points(points)) => draw_pie(&root, spec, points)?,
            (ChartKind::GroupedBar, ChartData::Grouped { categories, series }) => {
                draw_grouped_bars(&root, spec, categories, series)?
            }
            (ChartKind::Treemap, ChartData::Tree { leaves, .. }) => {
                draw_treemap(&root, spec, leaves)?
            }
            (kind, _) => return Err(format!("{kind:?} chart has mismatched data").into()),
        }

        root.present()?;
    }

    encode_png(pixels, width, height)
}

fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> DrawResult<Vec<u8>> {
    let image = RgbImage::from_raw(width, height, pixels).ok_or("bitmap size mismatch")?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}

/// Creates a bar graph with one bar per category
///
/// # Implementation Notes
/// * Categories sit at integer x positions, bars are 0.8 units wide
/// * The y axis always includes zero
fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &[CategoryPoint],
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    let (y_min, y_max) = value_range(points.iter().map(|p| p.value), true);
    let slots = labels.len().max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..slots as f64 - 0.5, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slots)
        .x_label_formatter(&|x: &f64| category_label(&labels, *x))
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .draw()?;

    chart.draw_series(points.iter().enumerate().map(|(i, p)| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, p.value)], BLUE.filled())
    }))?;

    Ok(())
}

/// Creates a grouped bar graph, one bar per series inside each category
fn draw_grouped_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    categories: &[String],
    series: &[Series],
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let labels: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
    let (y_min, y_max) = value_range(series.iter().flat_map(|s| s.values.iter().copied()), true);
    let slots = labels.len().max(1);
    let bar_width = 0.8 / series.len().max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..slots as f64 - 0.5, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slots)
        .x_label_formatter(&|x: &f64| category_label(&labels, *x))
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .draw()?;

    for (j, s) in series.iter().enumerate() {
        let color = palette(j);
        chart
            .draw_series(s.values.iter().enumerate().map(|(i, &value)| {
                let x0 = i as f64 - 0.4 + j as f64 * bar_width;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, value)], color.filled())
            }))?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

/// Creates a scatter plot over categorical x positions
///
/// # Implementation Notes
/// * Distinct labels get x positions in order of first appearance
/// * Points with a colour value are shaded on a red-to-blue scale,
///   the rest are drawn in plain blue
fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &[CategoryPoint],
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let mut labels: Vec<&str> = Vec::new();
    for point in points {
        if !labels.contains(&point.label.as_str()) {
            labels.push(point.label.as_str());
        }
    }
    let slots = labels.len().max(1);
    let (y_min, y_max) = value_range(points.iter().map(|p| p.value), false);
    let (c_min, c_max) = value_range(points.iter().filter_map(|p| p.color), false);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..slots as f64 - 0.5, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(slots)
        .x_label_formatter(&|x: &f64| category_label(&labels, *x))
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .draw()?;

    chart.draw_series(points.iter().map(|p| {
        let x = labels
            .iter()
            .position(|l| *l == p.label.as_str())
            .unwrap_or(0) as f64;
        let color = match p.color {
            Some(c) => gradient(normalise(c, c_min, c_max)),
            None => BLUE.to_rgba(),
        };
        Circle::new((x, p.value), 5, color.filled())
    }))?;

    Ok(())
}

/// Creates a pie (or donut, when the chart has a hole) from category values
///
/// # Implementation Notes
/// * Slices are drawn as polygons directly on the pixel grid
/// * Non-positive values are skipped; an all-zero chart shows a notice
fn draw_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &[CategoryPoint],
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(&spec.title, ("sans-serif", 30).into_font())?;
    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = (w.min(h) as f64 / 2.0) * 0.7;
    let inner = radius * spec.hole.unwrap_or(0.0).clamp(0.0, 0.95);

    let total: f64 = points.iter().map(|p| p.value.max(0.0)).sum();
    if total <= 0.0 {
        return draw_notice(&area, "No data");
    }

    let mut start = -PI / 2.0;
    for (i, point) in points.iter().enumerate().filter(|(_, p)| p.value > 0.0) {
        let sweep = point.value / total * 2.0 * PI;
        let end = start + sweep;
        let steps = ((sweep / (2.0 * PI)) * 180.0).ceil().max(2.0) as usize;

        let mut outline: Vec<(i32, i32)> = (0..=steps)
            .map(|k| polar(center, radius, start + sweep * k as f64 / steps as f64))
            .collect();
        if inner > 0.0 {
            outline.extend(
                (0..=steps)
                    .rev()
                    .map(|k| polar(center, inner, start + sweep * k as f64 / steps as f64)),
            );
        } else {
            outline.push((center.0 as i32, center.1 as i32));
        }
        area.draw(&Polygon::new(outline, palette(i).filled()))?;

        let middle = start + sweep / 2.0;
        let anchor = polar(center, radius + 18.0, middle);
        let share = point.value / total * 100.0;
        area.draw(&Text::new(
            format!("{} ({:.1}%)", point.label, share),
            anchor,
            ("sans-serif", 14).into_font(),
        ))?;

        start = end;
    }

    Ok(())
}

struct Tile<'a> {
    rect: (f64, f64, f64, f64),
    leaf: &'a TreeLeaf,
}

/// Creates a slice-and-dice treemap
///
/// # Implementation Notes
/// * Each path level splits its parent rectangle proportionally to the
///   summed leaf values, alternating horizontal and vertical cuts
/// * Leaves are shaded on a red-to-blue scale of their colour value
fn draw_treemap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    leaves: &[TreeLeaf],
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(&spec.title, ("sans-serif", 30).into_font())?;
    if leaves.is_empty() {
        return draw_notice(&area, "No data");
    }

    let (w, h) = area.dim_in_pixel();
    let refs: Vec<&TreeLeaf> = leaves.iter().collect();
    let mut tiles = Vec::with_capacity(leaves.len());
    slice_and_dice(&refs, 0, (0.0, 0.0, w as f64, h as f64), true, &mut tiles);

    let (c_min, c_max) = value_range(leaves.iter().map(|l| l.color), false);
    for tile in &tiles {
        let (x, y, tw, th) = tile.rect;
        let corners = [
            (x as i32, y as i32),
            ((x + tw) as i32, (y + th) as i32),
        ];
        let fill = gradient(normalise(tile.leaf.color, c_min, c_max));
        area.draw(&Rectangle::new(corners, fill.filled()))?;
        area.draw(&Rectangle::new(corners, WHITE.stroke_width(1)))?;

        if tw > 60.0 && th > 20.0 {
            let name = tile.leaf.path.first().map(String::as_str).unwrap_or("");
            area.draw(&Text::new(
                name.to_string(),
                (x as i32 + 4, y as i32 + 4),
                ("sans-serif", 12).into_font(),
            ))?;
        }
    }

    Ok(())
}

fn slice_and_dice<'a>(
    leaves: &[&'a TreeLeaf],
    depth: usize,
    rect: (f64, f64, f64, f64),
    horizontal: bool,
    tiles: &mut Vec<Tile<'a>>,
) {
    // Group by the path element at this depth, in order of first appearance.
    let mut groups: Vec<(Option<&str>, Vec<&'a TreeLeaf>)> = Vec::new();
    for leaf in leaves {
        let key = leaf.path.get(depth).map(String::as_str);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(*leaf),
            None => groups.push((key, vec![*leaf])),
        }
    }

    let weights: Vec<f64> = groups
        .iter()
        .map(|(_, members)| members.iter().map(|l| l.value.max(0.0)).sum())
        .collect();
    let total: f64 = weights.iter().sum();

    let (x, y, w, h) = rect;
    let mut offset = 0.0;
    for ((key, members), weight) in groups.into_iter().zip(weights) {
        let share = if total > 0.0 {
            weight / total
        } else {
            members.len() as f64 / leaves.len() as f64
        };
        let sub = if horizontal {
            (x + offset * w, y, w * share, h)
        } else {
            (x, y + offset * h, w, h * share)
        };
        offset += share;

        match key {
            Some(_) => slice_and_dice(&members, depth + 1, sub, !horizontal, tiles),
            None => split_evenly(&members, sub, horizontal, tiles),
        }
    }
}

// Leaves sharing a full path split their rectangle evenly.
fn split_evenly<'a>(
    leaves: &[&'a TreeLeaf],
    rect: (f64, f64, f64, f64),
    horizontal: bool,
    tiles: &mut Vec<Tile<'a>>,
) {
    let (x, y, w, h) = rect;
    let n = leaves.len().max(1) as f64;
    for (i, leaf) in leaves.iter().enumerate() {
        let i = i as f64;
        let sub = if horizontal {
            (x + w * i / n, y, w / n, h)
        } else {
            (x, y + h * i / n, w, h / n)
        };
        tiles.push(Tile { rect: sub, leaf: *leaf });
    }
}

fn draw_notice<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, message: &str) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2 - 30, h as i32 / 2),
        ("sans-serif", 20).into_font(),
    ))?;
    Ok(())
}

fn category_label(labels: &[&str], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 0.01 || index < 0.0 {
        return String::new();
    }
    labels
        .get(index as usize)
        .map(|l| l.to_string())
        .unwrap_or_default()
}

fn value_range(values: impl Iterator<Item = f64>, from_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if from_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let pad = ((hi - lo) * 0.1).max(1.0);
    let lower = if from_zero && lo == 0.0 { 0.0 } else { lo - pad };
    (lower, hi + pad)
}

fn normalise(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

// Diverging red -> white -> blue scale.
fn gradient(t: f64) -> RGBAColor {
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    let (from, to, t) = if t < 0.5 {
        ((178, 24, 43), (247, 247, 247), t * 2.0)
    } else {
        ((247, 247, 247), (33, 102, 172), (t - 0.5) * 2.0)
    };
    RGBAColor(
        lerp(from.0, to.0, t),
        lerp(from.1, to.1, t),
        lerp(from.2, to.2, t),
        1.0,
    )
}

fn palette(i: usize) -> RGBAColor {
    Palette99::pick(i).to_rgba()
}

fn polar(center: (f64, f64), radius: f64, angle: f64) -> (i32, i32) {
    (
        (center.0 + radius * angle.cos()).round() as i32,
        (center.1 + radius * angle.sin()).round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_only_on_whole_positions() {
        let labels = ["Asha", "Ben"];
        assert_eq!(category_label(&labels, 0.0), "Asha");
        assert_eq!(category_label(&labels, 1.0), "Ben");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 2.0), "");
    }

    #[test]
    fn empty_ranges_fall_back_to_unit() {
        assert_eq!(value_range(std::iter::empty(), true), (0.0, 1.0));
        let (lo, hi) = value_range([10.0, 20.0].into_iter(), true);
        assert_eq!(lo, 0.0);
        assert!(hi > 20.0);
    }

    #[test]
    fn gradient_ends_are_red_and_blue() {
        let red = gradient(0.0);
        let blue = gradient(1.0);
        assert_eq!((red.0, red.1, red.2), (178, 24, 43));
        assert_eq!((blue.0, blue.1, blue.2), (33, 102, 172));
    }
}
