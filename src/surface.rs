//! Render surface abstraction
//!
//! The compositor draws through the [`Surface`] trait: image draw, shape
//! primitives, label plates, masked background compositing, and a
//! CSS-style `filter` string for whole-frame adjustments. [`PixelSurface`]
//! is the bundled CPU implementation operating on an RGBA8 buffer.
//!
//! Coordinates are normalized to [0,1] in both axes, matching the
//! normalized output of the perception models; thicknesses and radii that
//! read more naturally in pixels are documented as such.

use std::sync::Arc;

use crate::frame::Frame;
use crate::models::SegmentationMask;

/// RGBA color, 0.0-1.0 per channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.2, 0.9, 0.4);
    pub const CYAN: Color = Color::rgb(0.2, 0.8, 0.9);
    pub const YELLOW: Color = Color::rgb(0.95, 0.85, 0.2);
    pub const MAGENTA: Color = Color::rgb(0.9, 0.3, 0.8);

    /// Opaque color from RGB components
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Copy with a different alpha
    pub const fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    fn to_rgba8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0) as u8,
            (self.g.clamp(0.0, 1.0) * 255.0) as u8,
            (self.b.clamp(0.0, 1.0) * 255.0) as u8,
            (self.a.clamp(0.0, 1.0) * 255.0) as u8,
        ]
    }
}

/// Rectangle in normalized [0,1] coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Clamp the rect to the unit square
    pub fn clamped(&self) -> Rect {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        Rect {
            x,
            y,
            width: self.width.clamp(0.0, 1.0 - x),
            height: self.height.clamp(0.0, 1.0 - y),
        }
    }
}

/// What to show behind the subject when replacing the background
#[derive(Clone)]
pub enum BackgroundFill {
    /// Flat color
    Color(Color),
    /// Image stretched to the surface
    Image(Arc<Frame>),
}

/// 2D draw target for one compositor tick
///
/// The compositor owns the surface exclusively for the duration of a tick;
/// draw calls are serialized by construction.
pub trait Surface {
    /// Target dimensions in pixels
    fn size(&self) -> (u32, u32);

    /// Draw the source frame across the whole target (base draw)
    fn draw_frame(&mut self, frame: &Frame);

    /// Fill a rectangle
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Outline a rectangle; thickness in pixels
    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f32);

    /// Fill a circle; radius normalized to target width
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color);

    /// Connected line segments; thickness in pixels
    fn stroke_polyline(&mut self, points: &[[f32; 2]], color: Color, thickness: f32);

    /// Text label with a tag plate at the given anchor
    fn draw_label(&mut self, text: &str, x: f32, y: f32, color: Color);

    /// Blur everything the mask marks as background; radius in pixels
    fn blur_background(&mut self, mask: &SegmentationMask, radius: u32);

    /// Replace everything the mask marks as background
    fn replace_background(&mut self, mask: &SegmentationMask, fill: &BackgroundFill);

    /// Apply a CSS-style filter string to the current contents
    /// (e.g. `"brightness(1.1) contrast(0.9) sepia(0.4)"`)
    fn set_filter(&mut self, filter: &str);
}

/// CPU surface backed by an RGBA8 buffer
pub struct PixelSurface {
    data: Vec<u8>,
    width: u32,
    height: u32,
    labels: Vec<(String, f32, f32)>,
}

impl PixelSurface {
    /// Create a black surface of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
            labels: Vec::new(),
        }
    }

    /// Raw RGBA pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Labels drawn since the last base draw
    ///
    /// Glyph rasterization belongs to the presentation layer; the pixel
    /// surface draws the tag plates and records the strings.
    pub fn labels(&self) -> &[(String, f32, f32)] {
        &self.labels
    }

    /// RGBA value at pixel coordinates (clamped)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    fn blend_px(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        let sa = src[3] as f32 / 255.0;
        for c in 0..3 {
            let d = self.data[idx + c] as f32;
            let s = src[c] as f32;
            self.data[idx + c] = (s * sa + d * (1.0 - sa)) as u8;
        }
        self.data[idx + 3] = 255;
    }

    fn px_rect(&self, rect: Rect) -> (i64, i64, i64, i64) {
        let r = rect.clamped();
        let x0 = (r.x * self.width as f32) as i64;
        let y0 = (r.y * self.height as f32) as i64;
        let x1 = ((r.x + r.width) * self.width as f32) as i64;
        let y1 = ((r.y + r.height) * self.height as f32) as i64;
        (x0, y0, x1, y1)
    }

    fn brush(&mut self, cx: f32, cy: f32, size: i64, color: [u8; 4]) {
        let px = (cx * self.width as f32) as i64;
        let py = (cy * self.height as f32) as i64;
        let half = (size / 2).max(0);
        for y in (py - half)..=(py + half) {
            for x in (px - half)..=(px + half) {
                self.blend_px(x, y, color);
            }
        }
    }

    /// Separable box blur over the whole buffer
    fn box_blurred(&self, radius: u32) -> Vec<u8> {
        let radius = radius.clamp(1, 16) as i64;
        let (w, h) = (self.width as i64, self.height as i64);
        let mut pass = self.data.clone();
        let mut out = self.data.clone();

        // Horizontal then vertical
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0u32; 3];
                let mut count = 0u32;
                for dx in -radius..=radius {
                    let sx = (x + dx).clamp(0, w - 1);
                    let idx = ((y * w + sx) * 4) as usize;
                    for c in 0..3 {
                        acc[c] += self.data[idx + c] as u32;
                    }
                    count += 1;
                }
                let idx = ((y * w + x) * 4) as usize;
                for c in 0..3 {
                    pass[idx + c] = (acc[c] / count) as u8;
                }
            }
        }
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0u32; 3];
                let mut count = 0u32;
                for dy in -radius..=radius {
                    let sy = (y + dy).clamp(0, h - 1);
                    let idx = ((sy * w + x) * 4) as usize;
                    for c in 0..3 {
                        acc[c] += pass[idx + c] as u32;
                    }
                    count += 1;
                }
                let idx = ((y * w + x) * 4) as usize;
                for c in 0..3 {
                    out[idx + c] = (acc[c] / count) as u8;
                }
            }
        }
        out
    }

    fn apply_filter_op(&mut self, name: &str, value: f32) {
        let f = |v: f32| (v.clamp(0.0, 255.0)) as u8;
        for px in self.data.chunks_exact_mut(4) {
            let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
            let (nr, ng, nb) = match name {
                "brightness" => (r * value, g * value, b * value),
                "contrast" => (
                    (r - 128.0) * value + 128.0,
                    (g - 128.0) * value + 128.0,
                    (b - 128.0) * value + 128.0,
                ),
                "saturate" => {
                    let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
                    (
                        luma + (r - luma) * value,
                        luma + (g - luma) * value,
                        luma + (b - luma) * value,
                    )
                }
                "grayscale" => {
                    let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
                    (
                        r + (luma - r) * value,
                        g + (luma - g) * value,
                        b + (luma - b) * value,
                    )
                }
                "sepia" => {
                    let sr = 0.393 * r + 0.769 * g + 0.189 * b;
                    let sg = 0.349 * r + 0.686 * g + 0.168 * b;
                    let sb = 0.272 * r + 0.534 * g + 0.131 * b;
                    (
                        r + (sr - r) * value,
                        g + (sg - g) * value,
                        b + (sb - b) * value,
                    )
                }
                _ => (r, g, b),
            };
            px[0] = f(nr);
            px[1] = f(ng);
            px[2] = f(nb);
        }
    }
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.labels.clear();
        let x_ratio = frame.width as f32 / self.width as f32;
        let y_ratio = frame.height as f32 / self.height as f32;
        for y in 0..self.height {
            for x in 0..self.width {
                let src = frame.pixel((x as f32 * x_ratio) as u32, (y as f32 * y_ratio) as u32);
                let idx = ((y * self.width + x) * 4) as usize;
                self.data[idx..idx + 4].copy_from_slice(&src);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rgba = color.to_rgba8();
        let (x0, y0, x1, y1) = self.px_rect(rect);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_px(x, y, rgba);
            }
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f32) {
        let t = (thickness.max(1.0)) / self.width as f32;
        let r = rect.clamped();
        let edges = [
            Rect { x: r.x, y: r.y, width: r.width, height: t },
            Rect { x: r.x, y: r.y + r.height - t, width: r.width, height: t },
            Rect { x: r.x, y: r.y, width: t, height: r.height },
            Rect { x: r.x + r.width - t, y: r.y, width: t, height: r.height },
        ];
        for edge in edges {
            self.fill_rect(edge, color);
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        let rgba = color.to_rgba8();
        let rpx = (radius * self.width as f32).max(1.0);
        let px = cx * self.width as f32;
        let py = cy * self.height as f32;
        let (x0, x1) = ((px - rpx) as i64, (px + rpx) as i64 + 1);
        let (y0, y1) = ((py - rpx) as i64, (py + rpx) as i64 + 1);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 - px;
                let dy = y as f32 - py;
                if dx * dx + dy * dy <= rpx * rpx {
                    self.blend_px(x, y, rgba);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[[f32; 2]], color: Color, thickness: f32) {
        let rgba = color.to_rgba8();
        let size = thickness.max(1.0) as i64;
        for pair in points.windows(2) {
            let [x0, y0] = pair[0];
            let [x1, y1] = pair[1];
            let steps = (((x1 - x0) * self.width as f32).abs()
                .max(((y1 - y0) * self.height as f32).abs()) as usize)
                .max(1);
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                self.brush(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, size, rgba);
            }
        }
    }

    fn draw_label(&mut self, text: &str, x: f32, y: f32, color: Color) {
        // Tag plate sized by text length; glyphs are left to the UI layer
        let plate_w = (text.len() as f32 * 8.0) / self.width as f32;
        let plate_h = 14.0 / self.height as f32;
        self.fill_rect(
            Rect { x, y, width: plate_w, height: plate_h },
            Color::BLACK.with_alpha(0.6),
        );
        self.fill_rect(
            Rect { x, y: y + plate_h, width: plate_w, height: 2.0 / self.height as f32 },
            color,
        );
        self.labels.push((text.to_string(), x, y));
    }

    fn blur_background(&mut self, mask: &SegmentationMask, radius: u32) {
        let blurred = self.box_blurred(radius);
        let (w, h) = (self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                let m = mask.sample(x as f32 / w as f32, y as f32 / h as f32);
                let idx = ((y * w + x) * 4) as usize;
                for c in 0..3 {
                    let orig = self.data[idx + c] as f32;
                    let blur = blurred[idx + c] as f32;
                    self.data[idx + c] = (orig * m + blur * (1.0 - m)) as u8;
                }
            }
        }
    }

    fn replace_background(&mut self, mask: &SegmentationMask, fill: &BackgroundFill) {
        let (w, h) = (self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                let nx = x as f32 / w as f32;
                let ny = y as f32 / h as f32;
                let m = mask.sample(nx, ny);
                let behind = match fill {
                    BackgroundFill::Color(c) => c.to_rgba8(),
                    BackgroundFill::Image(img) => img.pixel(
                        (nx * img.width as f32) as u32,
                        (ny * img.height as f32) as u32,
                    ),
                };
                let idx = ((y * w + x) * 4) as usize;
                for c in 0..3 {
                    let orig = self.data[idx + c] as f32;
                    self.data[idx + c] = (orig * m + behind[c] as f32 * (1.0 - m)) as u8;
                }
            }
        }
    }

    fn set_filter(&mut self, filter: &str) {
        for part in filter.split_whitespace() {
            let Some(open) = part.find('(') else { continue };
            let Some(close) = part.rfind(')') else { continue };
            if close <= open {
                continue;
            }
            let name = &part[..open];
            if let Ok(value) = part[open + 1..close].parse::<f32>() {
                self.apply_filter_op(name, value.max(0.0));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! Draw-call capture used by compositor and pipeline tests

    use super::*;

    /// One recorded draw operation
    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawOp {
        Frame(u64),
        FillRect,
        StrokeRect,
        Circle,
        Polyline(usize),
        Label(String),
        BlurBackground(u32),
        ReplaceBackground,
        Filter(String),
    }

    /// Surface that records draw calls instead of rasterizing
    #[derive(Default)]
    pub struct RecordingSurface {
        pub ops: Vec<DrawOp>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn op_index(&self, pred: impl Fn(&DrawOp) -> bool) -> Option<usize> {
            self.ops.iter().position(pred)
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (640, 360)
        }

        fn draw_frame(&mut self, frame: &Frame) {
            self.ops.push(DrawOp::Frame(frame.frame_number));
        }

        fn fill_rect(&mut self, _rect: Rect, _color: Color) {
            self.ops.push(DrawOp::FillRect);
        }

        fn stroke_rect(&mut self, _rect: Rect, _color: Color, _thickness: f32) {
            self.ops.push(DrawOp::StrokeRect);
        }

        fn fill_circle(&mut self, _cx: f32, _cy: f32, _radius: f32, _color: Color) {
            self.ops.push(DrawOp::Circle);
        }

        fn stroke_polyline(&mut self, points: &[[f32; 2]], _color: Color, _thickness: f32) {
            self.ops.push(DrawOp::Polyline(points.len()));
        }

        fn draw_label(&mut self, text: &str, _x: f32, _y: f32, _color: Color) {
            self.ops.push(DrawOp::Label(text.to_string()));
        }

        fn blur_background(&mut self, _mask: &SegmentationMask, radius: u32) {
            self.ops.push(DrawOp::BlurBackground(radius));
        }

        fn replace_background(&mut self, _mask: &SegmentationMask, _fill: &BackgroundFill) {
            self.ops.push(DrawOp::ReplaceBackground);
        }

        fn set_filter(&mut self, filter: &str) {
            self.ops.push(DrawOp::Filter(filter.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_writes_pixels() {
        let mut surface = PixelSurface::new(10, 10);
        surface.fill_rect(
            Rect { x: 0.0, y: 0.0, width: 0.5, height: 0.5 },
            Color::WHITE,
        );
        assert_eq!(surface.pixel(2, 2)[0], 255);
        assert_eq!(surface.pixel(8, 8)[0], 0);
    }

    #[test]
    fn test_filter_brightness() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(
            Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            Color::rgb(0.5, 0.5, 0.5),
        );
        let before = surface.pixel(1, 1)[0];
        surface.set_filter("brightness(1.5)");
        assert!(surface.pixel(1, 1)[0] > before);
    }

    #[test]
    fn test_filter_grayscale_equalizes_channels() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(
            Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            Color::rgb(1.0, 0.2, 0.2),
        );
        surface.set_filter("grayscale(1.0)");
        let px = surface.pixel(1, 1);
        assert!((px[0] as i32 - px[1] as i32).abs() <= 1);
        assert!((px[1] as i32 - px[2] as i32).abs() <= 1);
    }

    #[test]
    fn test_malformed_filter_is_ignored() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(
            Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            Color::rgb(0.4, 0.4, 0.4),
        );
        let before = surface.pixel(1, 1);
        surface.set_filter("nonsense brightness() (0.5)");
        assert_eq!(surface.pixel(1, 1), before);
    }

    #[test]
    fn test_replace_background_uses_mask() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(
            Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            Color::WHITE,
        );
        // Left half person, right half background
        let mask = SegmentationMask {
            mask: vec![1.0, 0.0],
            width: 2,
            height: 1,
        };
        surface.replace_background(&mask, &BackgroundFill::Color(Color::BLACK));
        assert_eq!(surface.pixel(0, 0)[0], 255);
        assert_eq!(surface.pixel(3, 0)[0], 0);
    }
}
