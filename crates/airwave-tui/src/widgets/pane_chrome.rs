//! Bordered pane shared by every view.
//!
//! The title sits top-left, an optional count or tag top-right, and a key
//! hint along the bottom edge while the pane has focus.

use crate::theme::{style_focused_border, style_muted, style_unfocused_border, C_MUTED, C_PRIMARY};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders},
};

/// Top-right tag, e.g. a row count or "ADMIN".
pub struct Badge<'a> {
    pub text: &'a str,
    pub color: Color,
}

pub fn pane_chrome<'a>(
    title: &'a str,
    hint: Option<&'a str>,
    focused: bool,
    badge: Option<Badge<'a>>,
) -> Block<'a> {
    let (border_style, title_style) = if focused {
        (
            style_focused_border(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )
    } else {
        (style_unfocused_border(), Style::default().fg(C_MUTED))
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Line::from(Span::styled(format!(" {} ", title), title_style)));

    if let Some(b) = badge {
        block = block.title_top(
            Line::from(Span::styled(
                format!(" {} ", b.text),
                Style::default().fg(b.color).add_modifier(Modifier::BOLD),
            ))
            .right_aligned(),
        );
    }
    match hint {
        Some(hint) if focused => {
            block.title_bottom(Line::from(Span::styled(format!(" {} ", hint), style_muted())))
        }
        _ => block,
    }
}
