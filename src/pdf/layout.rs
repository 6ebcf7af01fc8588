//! Text layer reconstruction from positioned glyphs

use std::cmp::Ordering;

/// One glyph of the text layer with its loose bounds, in points
#[derive(Debug, Clone)]
pub struct CharInfo {
    pub char: char,
    pub x: f32,
    /// Top edge; PDF space, so larger is higher on the page
    pub y: f32,
    pub width: f32,
    /// Glyph height, the font size estimate for headings
    pub height: f32,
}

impl CharInfo {
    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Glyphs sharing a baseline band
#[derive(Debug, Clone)]
pub struct LineInfo {
    /// Sorted left to right
    pub chars: Vec<CharInfo>,
    pub y: f32,
    pub avg_height: f32,
    pub min_x: f32,
    /// Right edge of the last glyph
    pub max_x: f32,
}

/// How horizontal gaps are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum LayoutMode {
    /// One space per gap
    #[default]
    Compact,
    /// Gaps and indentation become proportional runs of spaces, keeping table columns aligned
    Preserve,
}

/// Line spacing multiplier above which a blank line is emitted
const PARAGRAPH_THRESHOLD: f32 = 1.5;

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| cmp_f32(*a, *b));
    Some(values[values.len() / 2])
}

/// Rebuild page text from glyphs.
///
/// `page_width` enables watermark filtering when positive.
pub fn layout_text(chars: Vec<CharInfo>, page_width: f32, mode: LayoutMode) -> String {
    if chars.is_empty() {
        return String::new();
    }

    let (y_tolerance, space_threshold) = calculate_dynamic_thresholds(&chars);
    let char_width = median(
        chars
            .iter()
            .filter(|c| c.width > 0.0 && !c.char.is_whitespace())
            .map(|c| c.width)
            .collect(),
    )
    .unwrap_or(space_threshold)
    .max(1.0);

    let lines = group_into_lines(chars, y_tolerance);
    let lines = filter_watermarks(lines, page_width);

    build_text_output(&lines, space_threshold, char_width, mode)
}

/// Calculate thresholds from the median glyph height: (y tolerance, space gap)
fn calculate_dynamic_thresholds(chars: &[CharInfo]) -> (f32, f32) {
    let heights: Vec<f32> = chars
        .iter()
        .filter(|c| c.height > 0.0)
        .map(|c| c.height)
        .collect();

    match median(heights) {
        Some(median_height) => (
            (median_height * 0.4).max(2.0),
            (median_height * 0.3).max(3.0),
        ),
        None => (5.0, 10.0),
    }
}

/// Split glyphs into lines wherever the top edge jumps by more than `y_tolerance`
fn group_into_lines(mut chars: Vec<CharInfo>, y_tolerance: f32) -> Vec<LineInfo> {
    // Top to bottom, then left to right
    chars.sort_by(|a, b| cmp_f32(b.y, a.y).then_with(|| cmp_f32(a.x, b.x)));

    let mut lines: Vec<LineInfo> = Vec::new();
    let mut current_chars: Vec<CharInfo> = Vec::new();
    let mut current_y: Option<f32> = None;

    for char_info in chars {
        match current_y {
            Some(cur_y) if (cur_y - char_info.y).abs() <= y_tolerance => {
                current_chars.push(char_info);
            }
            _ => {
                if !current_chars.is_empty() {
                    lines.push(create_line_info(std::mem::take(&mut current_chars)));
                }
                current_y = Some(char_info.y);
                current_chars.push(char_info);
            }
        }
    }

    if !current_chars.is_empty() {
        lines.push(create_line_info(current_chars));
    }

    lines
}

fn create_line_info(mut chars: Vec<CharInfo>) -> LineInfo {
    chars.sort_by(|a, b| cmp_f32(a.x, b.x));

    let avg_height = chars.iter().map(|c| c.height).sum::<f32>() / chars.len().max(1) as f32;
    let min_x = chars.iter().map(|c| c.x).fold(f32::MAX, f32::min);
    let max_x = chars.iter().map(CharInfo::right).fold(f32::MIN, f32::max);
    let y = chars.first().map(|c| c.y).unwrap_or(0.0);

    LineInfo {
        chars,
        y,
        avg_height,
        min_x,
        max_x,
    }
}

/// Drop short, centered lines set much larger than the page average
fn filter_watermarks(lines: Vec<LineInfo>, page_width: f32) -> Vec<LineInfo> {
    if page_width <= 0.0 || lines.is_empty() {
        return lines;
    }

    let avg_font_height = lines.iter().map(|l| l.avg_height).sum::<f32>() / lines.len() as f32;
    let page_center = page_width / 2.0;
    let center_tolerance = page_width * 0.2;

    lines
        .into_iter()
        .filter(|line| {
            let line_center = (line.min_x + line.max_x) / 2.0;
            let is_centered = (line_center - page_center).abs() < center_tolerance;
            let is_large = line.avg_height > avg_font_height * 1.5;
            let is_short = line.chars.len() < 30;

            let watermark = is_centered && is_large && is_short;
            if watermark {
                tracing::debug!(y = line.y, "dropping watermark line");
            }
            !watermark
        })
        .collect()
}

fn build_text_output(
    lines: &[LineInfo],
    space_threshold: f32,
    char_width: f32,
    mode: LayoutMode,
) -> String {
    let left_margin = lines.iter().map(|l| l.min_x).fold(f32::MAX, f32::min);

    let mut result = String::new();
    let mut prev: Option<&LineInfo> = None;

    for line in lines {
        if let Some(p) = prev {
            let line_gap = p.y - line.y;
            let normal_gap = p.avg_height.max(line.avg_height);
            if line_gap > normal_gap * PARAGRAPH_THRESHOLD {
                result.push('\n');
            }
        }

        if mode == LayoutMode::Preserve {
            let indent = ((line.min_x - left_margin) / char_width).round().max(0.0) as usize;
            result.extend(std::iter::repeat(' ').take(indent));
        }

        let mut prev_char: Option<&CharInfo> = None;
        for c in &line.chars {
            if let Some(pc) = prev_char {
                let gap = c.x - pc.right();
                if gap > space_threshold && !c.char.is_whitespace() && !pc.char.is_whitespace() {
                    let spaces = match mode {
                        LayoutMode::Compact => 1,
                        LayoutMode::Preserve => ((gap / char_width).round() as usize).max(1),
                    };
                    result.extend(std::iter::repeat(' ').take(spaces));
                }
            }
            result.push(c.char);
            prev_char = Some(c);
        }

        result.push('\n');
        prev = Some(line);
    }

    result.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Glyphs for `text` starting at `x`, each `w` wide and `h` high
    fn word(text: &str, x: f32, y: f32, w: f32, h: f32) -> Vec<CharInfo> {
        text.chars()
            .enumerate()
            .map(|(i, c)| CharInfo {
                char: c,
                x: x + i as f32 * w,
                y,
                width: w,
                height: h,
            })
            .collect()
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(layout_text(Vec::new(), 600.0, LayoutMode::Compact), "");
    }

    #[test]
    fn test_words_split_on_gaps_only() {
        let mut chars = word("World", 50.0, 700.0, 6.0, 10.0);
        chars.extend(word("Hello", 10.0, 700.0, 6.0, 10.0));
        assert_eq!(layout_text(chars, 0.0, LayoutMode::Compact), "Hello World");
    }

    #[test]
    fn test_lines_and_paragraphs() {
        let mut chars = word("first", 10.0, 700.0, 6.0, 10.0);
        chars.extend(word("second", 10.0, 686.5, 6.0, 10.0));
        chars.extend(word("third", 10.0, 650.0, 6.0, 10.0));
        assert_eq!(
            layout_text(chars, 0.0, LayoutMode::Compact),
            "first\nsecond\n\nthird"
        );
    }

    #[test]
    fn test_baseline_jitter_stays_on_one_line() {
        let mut chars = word("报关单", 10.0, 700.0, 10.0, 10.0);
        chars.extend(word("编号", 60.0, 701.5, 10.0, 10.0));
        assert_eq!(layout_text(chars, 0.0, LayoutMode::Compact), "报关单 编号");
    }

    #[test]
    fn test_watermark_filtered() {
        let mut chars = Vec::new();
        chars.extend(word("Consignor ACME", 20.0, 760.0, 6.0, 10.0));
        chars.extend(word("Consignee RETAIL", 20.0, 740.0, 6.0, 10.0));
        chars.extend(word("Port SYDNEY", 20.0, 720.0, 6.0, 10.0));
        chars.extend(word("CONFIDENTIAL", 204.0, 400.0, 16.0, 40.0));

        let text = layout_text(chars.clone(), 600.0, LayoutMode::Compact);
        assert!(!text.contains("CONFIDENTIAL"));
        assert!(text.starts_with("Consignor ACME"));

        let unfiltered = layout_text(chars, 0.0, LayoutMode::Compact);
        assert!(unfiltered.contains("CONFIDENTIAL"));
    }

    #[test]
    fn test_preserve_mode_keeps_columns() {
        let mut chars = word("Name", 0.0, 700.0, 6.0, 10.0);
        chars.extend(word("Value", 60.0, 700.0, 6.0, 10.0));
        chars.extend(word("HS", 12.0, 686.0, 6.0, 10.0));
        chars.extend(word("0901", 60.0, 686.0, 6.0, 10.0));

        let text = layout_text(chars, 0.0, LayoutMode::Preserve);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name      Value");
        assert_eq!(lines[1], "  HS      0901");
        assert_eq!(lines[0].find("Value"), lines[1].find("0901"));
    }

    #[test]
    fn test_dynamic_thresholds_floor() {
        let chars = word("ab", 0.0, 0.0, 1.0, 2.0);
        assert_eq!(calculate_dynamic_thresholds(&chars), (2.0, 3.0));

        let chars = word("ab", 0.0, 0.0, 1.0, 0.0);
        assert_eq!(calculate_dynamic_thresholds(&chars), (5.0, 10.0));
    }
}
