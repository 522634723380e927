use crossterm::style::Color;
use image::RgbaImage;

use crate::terminal::Terminal;

fn cell_color(px: &image::Rgba<u8>) -> Color {
    let [r, g, b, _] = px.0;
    Color::Rgb { r, g, b }
}

/// Present `img` using half-block characters: each cell shows two stacked
/// pixels, the top one as the `▀` foreground and the bottom one as background.
pub fn present(term: &mut Terminal, img: &RgbaImage, y_offset: u16) {
    let (cols, rows) = term.size();
    let cells_h = img.height().div_ceil(2);

    for cy in 0..cells_h {
        let ty = y_offset as u32 + cy;
        if ty >= rows as u32 {
            break;
        }
        let top_row = cy * 2;
        let bot_row = top_row + 1;

        for cx in 0..img.width().min(cols as u32) {
            let top = cell_color(img.get_pixel(cx, top_row));
            let bottom = if bot_row < img.height() {
                Some(cell_color(img.get_pixel(cx, bot_row)))
            } else {
                None
            };
            term.set_with_bg(cx as i32, ty as i32, '▀', Some(top), bottom, false);
        }
    }
}
