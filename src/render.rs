use base64::{Engine as _, engine::general_purpose};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

// ================= 卡片配色 =================

pub const CARD_BLACK: RGBColor = RGBColor(16, 16, 16);
pub const CARD_WHITE: RGBColor = RGBColor(255, 255, 255);
pub const CARD_GRAY: RGBColor = RGBColor(128, 128, 128);
pub const CARD_GRAY_LIGHT: RGBColor = RGBColor(200, 200, 200);
pub const CARD_GRAY_DARK: RGBColor = RGBColor(75, 75, 75);
pub const CARD_PAPER: RGBColor = RGBColor(248, 248, 248);
// 五星金 / 四星紫
pub const STAR5: RGBColor = RGBColor(194, 152, 99);
pub const STAR4: RGBColor = RGBColor(128, 85, 194);

/// 在位图缓冲上绘制卡片，返回 RGBA 图像供后续叠加图标
pub fn draw_card<F>(width: u32, height: u32, bg: RGBColor, draw: F) -> Result<RgbaImage, String>
where
    F: for<'a> FnOnce(&DrawingArea<BitMapBackend<'a>, Shift>) -> Result<(), String>,
{
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&bg).map_err(|e| e.to_string())?;
        draw(&root)?;
        root.present().map_err(|e| e.to_string())?;
    }

    let mut rgba_image = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            rgba_image.put_pixel(
                x,
                y,
                Rgba([buffer[idx], buffer[idx + 1], buffer[idx + 2], 255]),
            );
        }
    }
    Ok(rgba_image)
}

pub fn font<'a>(family: &'a str, size: u32, color: &'a RGBColor) -> TextStyle<'a> {
    (family, size).into_font().color(color)
}

/// 画一条横线
pub fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    from: (i32, i32),
    to: (i32, i32),
    color: RGBColor,
    width: u32,
) -> Result<(), String> {
    root.draw(&PathElement::new(
        vec![from, to],
        color.stroke_width(width),
    ))
    .map_err(|e| e.to_string())
}

/// 画矩形边框
pub fn draw_rect_outline<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    top_left: (i32, i32),
    bottom_right: (i32, i32),
    color: RGBColor,
    width: u32,
) -> Result<(), String> {
    root.draw(&Rectangle::new(
        [top_left, bottom_right],
        color.stroke_width(width),
    ))
    .map_err(|e| e.to_string())
}

/// 卡片外侧的双线边框（外粗内细）
pub fn draw_frame<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    width: u32,
    height: u32,
    outer: RGBColor,
    inner: RGBColor,
) -> Result<(), String> {
    let w = width as i32;
    let h = height as i32;
    draw_rect_outline(root, (10, 10), (w - 10, h - 10), outer, 6)?;
    draw_rect_outline(root, (20, 20), (w - 20, h - 20), inner, 2)
}

// ================= 图标处理 =================

/// 读取图标并缩放为指定尺寸
pub fn load_icon(path: &Path, size: u32) -> Option<RgbaImage> {
    let img = image::open(path).ok()?;
    Some(
        img.resize_exact(size, size, FilterType::Lanczos3)
            .to_rgba8(),
    )
}

/// 读取图标并裁剪为圆形
pub fn load_icon_circular(path: &Path, size: u32) -> Option<RgbaImage> {
    let img = image::open(path).ok()?;
    let resized = img.resize_exact(size, size, FilterType::Lanczos3);
    Some(make_circular(&resized, size))
}

pub fn make_circular(img: &DynamicImage, size: u32) -> RgbaImage {
    let rgba = img.to_rgba8();
    let mut result = RgbaImage::new(size, size);
    let center = size as f32 / 2.0;
    let radius = center - 1.0;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center + 0.5;
            let dy = y as f32 - center + 0.5;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist <= radius - 0.5 {
                result.put_pixel(x, y, *rgba.get_pixel(x, y));
            } else if dist <= radius + 0.5 {
                let alpha = (radius + 0.5 - dist).clamp(0.0, 1.0);
                let mut pixel = *rgba.get_pixel(x, y);
                pixel[3] = (pixel[3] as f32 * alpha) as u8;
                result.put_pixel(x, y, pixel);
            }
        }
    }
    result
}

/// 带 Alpha 混合地将图标叠加到底图上
pub fn overlay_image(base: &mut RgbaImage, overlay: &RgbaImage, x: i32, y: i32) {
    let (base_w, base_h) = base.dimensions();
    let (overlay_w, overlay_h) = overlay.dimensions();

    for oy in 0..overlay_h {
        for ox in 0..overlay_w {
            let bx = x + ox as i32;
            let by = y + oy as i32;

            if bx >= 0 && bx < base_w as i32 && by >= 0 && by < base_h as i32 {
                let bg = base.get_pixel(bx as u32, by as u32);
                let fg = overlay.get_pixel(ox, oy);

                let alpha = fg[3] as f32 / 255.0;
                if alpha > 0.0 {
                    let blended = Rgba([
                        ((1.0 - alpha) * bg[0] as f32 + alpha * fg[0] as f32) as u8,
                        ((1.0 - alpha) * bg[1] as f32 + alpha * fg[1] as f32) as u8,
                        ((1.0 - alpha) * bg[2] as f32 + alpha * fg[2] as f32) as u8,
                        255,
                    ]);
                    base.put_pixel(bx as u32, by as u32, blended);
                }
            }
        }
    }
}

/// 编码为 OneBot 可用的 base64 图片段内容
pub fn to_base64_png(img: RgbaImage) -> Result<String, String> {
    let dynamic_image = DynamicImage::ImageRgba8(img);
    let mut cursor = std::io::Cursor::new(Vec::new());
    dynamic_image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| format!("图片编码失败: {}", e))?;
    let b64 = general_purpose::STANDARD.encode(cursor.into_inner());
    Ok(format!("base64://{}", b64))
}

/// 将已有图片文件编码为 base64 图片段内容
pub fn file_to_base64(data: &[u8]) -> String {
    format!("base64://{}", general_purpose::STANDARD.encode(data))
}

/// 等级显示格式：个位数补零
pub fn level_fmt(level: i64) -> String {
    if level < 10 {
        format!("Lv.0{level}")
    } else {
        format!("Lv.{level}")
    }
}

/// 秒数格式化为 "X小时Y分"
pub fn time_fmt(sec: i64) -> String {
    let min = sec / 60;
    let (hour, min) = (min / 60, min % 60);
    format!("{hour}小时{min}分")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_fmt_pads_single_digit() {
        assert_eq!(level_fmt(7), "Lv.07");
        assert_eq!(level_fmt(10), "Lv.10");
        assert_eq!(level_fmt(80), "Lv.80");
    }

    #[test]
    fn time_fmt_splits_hours_and_minutes() {
        assert_eq!(time_fmt(0), "0小时0分");
        assert_eq!(time_fmt(59), "0小时0分");
        assert_eq!(time_fmt(60), "0小时1分");
        assert_eq!(time_fmt(3660), "1小时1分");
        assert_eq!(time_fmt(86399), "23小时59分");
    }

    #[test]
    fn overlay_blends_alpha() {
        let mut base = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        overlay_image(&mut base, &overlay, 1, 1);
        assert_eq!(base.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(base.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(base.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
        assert_eq!(base.get_pixel(3, 3), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn overlay_clips_out_of_bounds() {
        let mut base = RgbaImage::from_pixel(2, 2, Rgba([10, 10, 10, 255]));
        let overlay = RgbaImage::from_pixel(4, 4, Rgba([200, 0, 0, 255]));
        overlay_image(&mut base, &overlay, -2, -2);
        assert_eq!(base.get_pixel(0, 0), &Rgba([200, 0, 0, 255]));
        assert_eq!(base.get_pixel(1, 1), &Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn base64_png_has_prefix() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let encoded = to_base64_png(img).unwrap();
        assert!(encoded.starts_with("base64://"));
        assert!(encoded.len() > "base64://".len());
    }
}
