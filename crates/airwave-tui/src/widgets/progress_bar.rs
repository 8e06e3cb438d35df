//! Smooth Unicode progress bar, used for the stream timeline and the sleep
//! countdown.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_SECONDARY};

/// `progress` is 0.0..=1.0; the labels are drawn either side of the bar.
pub fn draw_progress(
    frame: &mut Frame,
    area: Rect,
    progress: f64,
    left_label: &str,
    right_label: &str,
    color: Color,
) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let label_w = (left_label.chars().count() + right_label.chars().count() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let mut spans = Vec::new();
    if !left_label.is_empty() {
        spans.push(Span::styled(
            format!("{} ", left_label),
            Style::default().fg(C_SECONDARY),
        ));
    }
    spans.push(Span::styled(bar(progress, bar_w), Style::default().fg(color)));
    if !right_label.is_empty() {
        spans.push(Span::styled(
            format!(" {}", right_label),
            Style::default().fg(C_MUTED),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// 8 eighths per cell.
fn bar(progress: f64, width: usize) -> String {
    const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let eighths = (progress * width as f64 * 8.0) as usize;
    let full_blocks = (eighths / 8).min(width);
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full_blocks {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

pub fn fmt_time(secs: f64) -> String {
    if secs.is_nan() || secs < 0.0 {
        return "0:00".to_string();
    }
    let s = secs as u64;
    let h = s / 3600;
    let m = (s % 3600) / 60;
    let s = s % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
