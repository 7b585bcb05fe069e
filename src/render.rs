//! Stats table and frame overlay.

use anyhow::{anyhow, Result};

use crate::aggregate::FlavorStat;
use crate::detect::Frame;
use crate::mapping::CoordinateMapper;

pub const MARKER_RADIUS: i64 = 8;
const MARKER_COLOR: [u8; 3] = [0, 0, 0];

/// One displayed row of the ranked flavor table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub flavor: String,
    pub avg_confidence: String,
    /// Mirror-corrected pixel position, `"x, y"`.
    pub coordinates: String,
}

pub fn render_table(stats: &[FlavorStat], mapper: &CoordinateMapper) -> Vec<TableRow> {
    stats
        .iter()
        .map(|stat| {
            let corrected = mapper.correct(stat.last_coord.x, stat.last_coord.y);
            TableRow {
                flavor: stat.label.clone(),
                avg_confidence: format!("{:.2}", stat.avg_confidence),
                coordinates: format!(
                    "{}, {}",
                    corrected.x.trunc().abs() as i64,
                    corrected.y.trunc().abs() as i64
                ),
            }
        })
        .collect()
}

pub fn format_table(rows: &[TableRow]) -> String {
    let headers = ["Flavor", "Avg Confidence", "Coordinates"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.flavor.len());
        widths[1] = widths[1].max(row.avg_confidence.len());
        widths[2] = widths[2].max(row.coordinates.len());
    }
    let mut out = format!(
        "{:<w0$}  {:<w1$}  {:<w2$}\n",
        headers[0],
        headers[1],
        headers[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2]
    );
    for row in rows {
        out.push_str(&format!(
            "{:<w0$}  {:<w1$}  {:<w2$}\n",
            row.flavor,
            row.avg_confidence,
            row.coordinates,
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        ));
    }
    out
}

/// Draw a hollow circle at each flavor's last-seen position.
///
/// Frames without pixel data are left alone. Markers are clipped to the frame.
pub fn draw_markers(frame: &mut Frame, stats: &[FlavorStat]) -> Result<()> {
    if !frame.has_pixels() {
        return Ok(());
    }
    let expected = (frame.width as usize)
        .checked_mul(frame.height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    if frame.pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGB bytes for {}x{} frame, found {}",
            expected,
            frame.width,
            frame.height,
            frame.pixels.len()
        ));
    }
    for stat in stats {
        draw_circle(
            frame,
            stat.last_coord.x.round() as i64,
            stat.last_coord.y.round() as i64,
        );
    }
    Ok(())
}

fn draw_circle(frame: &mut Frame, cx: i64, cy: i64) {
    // Midpoint circle, one pixel thick.
    let mut x = MARKER_RADIUS;
    let mut y = 0i64;
    let mut err = 1 - MARKER_RADIUS;
    while x >= y {
        for (dx, dy) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            put_pixel(frame, cx + dx, cy + dy);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

fn put_pixel(frame: &mut Frame, x: i64, y: i64) {
    if x < 0 || y < 0 || x >= i64::from(frame.width) || y >= i64::from(frame.height) {
        return;
    }
    let idx = (y as usize * frame.width as usize + x as usize) * 3;
    frame.pixels[idx..idx + 3].copy_from_slice(&MARKER_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{AxisTransform, Orientation};
    use crate::PixelCoord;

    fn stat(label: &str, x: f64, y: f64) -> FlavorStat {
        FlavorStat {
            label: label.to_string(),
            count: 1,
            avg_confidence: 0.876,
            last_coord: PixelCoord::new(x, y),
        }
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * frame.width as usize + x) * 3;
        [frame.pixels[idx], frame.pixels[idx + 1], frame.pixels[idx + 2]]
    }

    #[test]
    fn table_shows_corrected_integer_coordinates() {
        let mapper = CoordinateMapper::new(
            640,
            640,
            Orientation::MIRRORED,
            AxisTransform::new(0.41, 150.0),
            AxisTransform::new(-0.41, 262.0),
            100.0,
        );
        let rows = render_table(&[stat("coconut", 100.7, 40.2)], &mapper);
        assert_eq!(rows[0].avg_confidence, "0.88");
        assert_eq!(rows[0].coordinates, "539, 599");
        let text = format_table(&rows);
        assert!(text.starts_with("Flavor"));
        assert!(text.contains("coconut"));
    }

    #[test]
    fn marker_ring_is_drawn_around_center() {
        let mut frame = Frame::blank(32, 32);
        draw_markers(&mut frame, &[stat("lemon_lime", 16.0, 16.0)]).unwrap();
        assert_eq!(pixel(&frame, 16 + 8, 16), MARKER_COLOR);
        assert_eq!(pixel(&frame, 16, 16 - 8), MARKER_COLOR);
        assert_eq!(pixel(&frame, 16, 16), [0xff; 3]);
    }

    #[test]
    fn markers_clip_at_frame_edges() {
        let mut frame = Frame::blank(10, 10);
        draw_markers(&mut frame, &[stat("cinnamon", 0.0, 0.0)]).unwrap();
        assert_eq!(pixel(&frame, 8, 0), MARKER_COLOR);
    }

    #[test]
    fn mismatched_buffer_is_a_render_error() {
        let mut frame = Frame {
            width: 4,
            height: 4,
            pixels: vec![0; 5],
        };
        assert!(draw_markers(&mut frame, &[stat("x", 1.0, 1.0)]).is_err());
        let mut empty = Frame::empty(4, 4);
        assert!(draw_markers(&mut empty, &[stat("x", 1.0, 1.0)]).is_ok());
    }
}
