//! Drawing the timestamp, note and channel labels onto a capture.
//!
//! Menus and the logo of the instrument are blacked out. The date and time go
//! into the top left corner; the note and channel labels are written top to
//! bottom in columns along the right edge, each in the color of its channel.
use chrono::NaiveDateTime;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use scope_client::capture::CHANNELS;

const GLYPH_SIZE: u32 = 8;
/// Horizontal advance per character, one pixel wider than a glyph.
const ADVANCE: u32 = GLYPH_SIZE + 1;
const LABEL_SPACING: u32 = 14;
const LABEL_TOP: u32 = 44;
const LABEL_MARGIN: u32 = 10;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TIMESTAMP_COLOR: Rgba<u8> = Rgba([0, 219, 146, 255]);
const NOTE_COLOR: Rgba<u8> = Rgba([176, 176, 176, 255]);
const CHANNEL_COLORS: [Rgba<u8>; CHANNELS] = [
    Rgba([247, 250, 82, 255]),
    Rgba([0, 225, 221, 255]),
    Rgba([221, 0, 221, 255]),
    Rgba([0, 127, 245, 255]),
];

/// Regions of an 800x480 screen to black out, as `(x0, y0, x1, y1)` with exclusive ends.
const ERASED: [(u32, u32, u32, u32); 5] = [
    (3, 8, 80, 28),       // logo
    (0, 37, 59, 450),     // left menu
    (705, 38, 799, 436),  // right menu items
    (690, 39, 704, 117),  // right menu tab
    (762, 456, 799, 479), // lower right icon
];

/// Everything drawn onto a capture.
#[derive(Clone, Debug)]
pub struct Annotation<'a> {
    pub note: Option<&'a str>,
    pub labels: &'a [Option<String>; CHANNELS],
    pub timestamp: NaiveDateTime,
}

/// Returns a copy of `image` with menus erased and `annotation` drawn onto it.
pub fn annotate(image: &RgbaImage, annotation: &Annotation) -> RgbaImage {
    let mut out = image.clone();
    for (x0, y0, x1, y1) in ERASED {
        fill_rect(&mut out, x0, y0, x1, y1, BLACK);
    }

    let date = annotation.timestamp.format("%Y-%m-%d").to_string();
    let time = annotation.timestamp.format("%H:%M:%S").to_string();
    draw_text(&mut out, &date, 2, 2, TIMESTAMP_COLOR);
    draw_text(&mut out, &time, 2, 15, TIMESTAMP_COLOR);

    let note = annotation.note.map(|note| (note.to_string(), NOTE_COLOR));
    let labels = annotation.labels.iter().enumerate().map(|(i, label)| {
        label
            .as_ref()
            .map(|label| (format!("CH{}: {}", i + 1, label), CHANNEL_COLORS[i]))
    });
    let texts = std::iter::once(note).chain(labels);

    let mut x = out.width().saturating_sub(LABEL_MARGIN + LABEL_SPACING);
    for (text, color) in texts.flatten().filter(|(text, _)| !text.is_empty()) {
        draw_text_rotated(&mut out, &text, x, LABEL_TOP, color);
        x = x.saturating_sub(LABEL_SPACING);
    }
    out
}

fn fill_rect(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            image.put_pixel(x, y, color);
        }
    }
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or_default()
}

/// Calls `plot` with the position of every set pixel of `text`, relative to its top left corner.
fn rasterize(text: &str, mut plot: impl FnMut(u32, u32)) {
    for (i, c) in text.chars().enumerate() {
        let origin = i as u32 * ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                // bit 0 is the leftmost pixel
                if bits & (1 << col) != 0 {
                    plot(origin + col, row as u32);
                }
            }
        }
    }
}

fn put_clipped(image: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

fn draw_text(image: &mut RgbaImage, text: &str, x: u32, y: u32, color: Rgba<u8>) {
    rasterize(text, |dx, dy| put_clipped(image, x + dx, y + dy, color));
}

/// Draws `text` rotated by 90 degrees clockwise, reading top to bottom.
fn draw_text_rotated(image: &mut RgbaImage, text: &str, x: u32, y: u32, color: Rgba<u8>) {
    rasterize(text, |dx, dy| {
        put_clipped(image, x + (GLYPH_SIZE - 1 - dy), y + dx, color)
    });
}

#[cfg(test)]
mod test {
    use super::{
        Annotation, BLACK, CHANNEL_COLORS, LABEL_TOP, NOTE_COLOR, TIMESTAMP_COLOR, annotate,
    };
    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn annotation(labels: &[Option<String>; 4]) -> Annotation<'_> {
        Annotation {
            note: None,
            labels,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        }
    }

    fn count(image: &RgbaImage, color: Rgba<u8>, columns: std::ops::Range<u32>) -> usize {
        image
            .enumerate_pixels()
            .filter(|(x, _, p)| columns.contains(x) && **p == color)
            .count()
    }

    #[test]
    fn menus_are_erased() {
        let image = RgbaImage::from_pixel(800, 480, WHITE);
        let out = annotate(&image, &annotation(&Default::default()));
        assert_eq!(*out.get_pixel(30, 200), BLACK);
        assert_eq!(*out.get_pixel(750, 200), BLACK);
        assert_eq!(*out.get_pixel(780, 470), BLACK);
        assert_eq!(*out.get_pixel(400, 240), WHITE);
        // the original is untouched
        assert_eq!(*image.get_pixel(30, 200), WHITE);
    }

    #[test]
    fn timestamp_is_drawn() {
        let image = RgbaImage::from_pixel(800, 480, WHITE);
        let out = annotate(&image, &annotation(&Default::default()));
        assert!(count(&out, TIMESTAMP_COLOR, 0..100) > 0);
    }

    #[test]
    fn labels_are_drawn_in_channel_colors() {
        let image = RgbaImage::from_pixel(800, 480, WHITE);
        let labels = [None, Some("clk".to_string()), None, Some("data".to_string())];
        let mut annotation = annotation(&labels);
        annotation.note = Some("boot");
        let out = annotate(&image, &annotation);

        assert!(count(&out, NOTE_COLOR, 776..784) > 0);
        assert!(count(&out, CHANNEL_COLORS[1], 762..770) > 0);
        assert!(count(&out, CHANNEL_COLORS[3], 748..756) > 0);
        assert_eq!(count(&out, CHANNEL_COLORS[0], 0..800), 0);
        // rotated text starts below the label top
        assert!(
            out.enumerate_pixels()
                .filter(|(_, _, p)| **p == NOTE_COLOR)
                .all(|(_, y, _)| y >= LABEL_TOP)
        );
    }

    #[test]
    fn small_images_are_clipped() {
        let image = RgbaImage::from_pixel(40, 20, WHITE);
        let labels = [Some("a very long label".to_string()), None, None, None];
        let out = annotate(&image, &annotation(&labels));
        assert_eq!(out.dimensions(), (40, 20));
    }
}
