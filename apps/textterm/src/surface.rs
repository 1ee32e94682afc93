use std::io::{self, Stdout};
use std::str::FromStr;

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Position;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use textterm_core::{
    DisplaySurface, ERROR_PROMPT_STYLE, Ledger, PaneStyle, PromptStyle, RegionStyle, SurfaceEffect,
};
use tracing::{trace, warn};

use crate::markup;

const MASK: char = '•';

/// The transcript laid out for a given width.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub lines: Vec<Line<'static>>,
    /// Column and row of the caret when the open input accepts edits.
    pub cursor: Option<(u16, u16)>,
    pub pane: Style,
}

pub fn layout(ledger: &Ledger, pane: &PaneStyle, width: u16) -> Screen {
    let mut writer = Writer::new(usize::from(width.max(1)));
    let active = ledger.active().id();
    let mut cursor = None;
    for pair in ledger.pairs() {
        let prompt_style = match pair.prompt_style() {
            PromptStyle::Normal(style) => region_style(style),
            PromptStyle::Special(tag) if tag == ERROR_PROMPT_STYLE => {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            }
            PromptStyle::Special(_) => Style::default(),
        };
        for (idx, line) in markup::parse(pair.prompt()).iter().enumerate() {
            if idx > 0 {
                writer.newline();
            }
            for run in line {
                let style = if run.bold {
                    prompt_style.add_modifier(Modifier::BOLD)
                } else {
                    prompt_style
                };
                writer.write(&run.text, style);
            }
        }
        if !pair.shows_input() {
            continue;
        }
        let input_style = region_style(pair.input_style());
        if pair.is_masked() {
            let masked: String = pair.input().chars().map(|_| MASK).collect();
            writer.write(&masked, input_style);
        } else {
            writer.write(pair.input(), input_style);
        }
        if pair.id() == active && pair.is_editable() {
            cursor = Some(writer.caret());
        }
    }
    Screen {
        lines: writer.finish(),
        cursor,
        pane: pane_style(pane),
    }
}

struct Writer {
    width: usize,
    rows: Vec<Vec<Span<'static>>>,
    col: usize,
}

impl Writer {
    fn new(width: usize) -> Self {
        Self {
            width,
            rows: vec![Vec::new()],
            col: 0,
        }
    }

    fn newline(&mut self) {
        self.rows.push(Vec::new());
        self.col = 0;
    }

    fn write(&mut self, text: &str, style: Style) {
        for c in text.chars() {
            if self.col >= self.width {
                self.newline();
            }
            if let Some(row) = self.rows.last_mut() {
                match row.last_mut() {
                    Some(span) if span.style == style => span.content.to_mut().push(c),
                    _ => row.push(Span::styled(c.to_string(), style)),
                }
            }
            self.col += 1;
        }
    }

    fn caret(&mut self) -> (u16, u16) {
        if self.col >= self.width {
            self.newline();
        }
        let row = self.rows.len() - 1;
        (
            u16::try_from(self.col).unwrap_or(u16::MAX),
            u16::try_from(row).unwrap_or(u16::MAX),
        )
    }

    fn finish(self) -> Vec<Line<'static>> {
        self.rows.into_iter().map(Line::from).collect()
    }
}

fn color(name: Option<&str>) -> Option<Color> {
    Color::from_str(name?).ok()
}

fn region_style(region: &RegionStyle) -> Style {
    let mut style = Style::default();
    if let Some(fg) = color(region.color.as_deref()) {
        style = style.fg(fg);
    }
    if let Some(bg) = color(region.background.as_deref()) {
        style = style.bg(bg);
    }
    if region.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if region.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if region.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

fn pane_style(pane: &PaneStyle) -> Style {
    match color(pane.background.as_deref()) {
        Some(bg) => Style::default().bg(bg),
        None => Style::default(),
    }
}

/// Full-screen surface on the controlling terminal. The tail of the
/// transcript is always in view.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    screen: Screen,
    focused: bool,
}

impl TerminalSurface {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableBracketedPaste)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            screen: Screen::default(),
            focused: false,
        })
    }

    fn draw(&mut self) {
        let screen = &self.screen;
        let focused = self.focused;
        let result = self.terminal.draw(|frame| {
            let area = frame.area();
            let skip = screen.lines.len().saturating_sub(usize::from(area.height));
            let paragraph = Paragraph::new(screen.lines[skip..].to_vec()).style(screen.pane);
            frame.render_widget(paragraph, area);
            if let Some((col, row)) = screen.cursor.filter(|_| focused) {
                if let Some(row) = usize::from(row).checked_sub(skip) {
                    let row = u16::try_from(row).unwrap_or(u16::MAX);
                    frame.set_cursor_position(Position::new(area.x + col, area.y + row));
                }
            }
        });
        if let Err(err) = result {
            warn!(target = "textterm.surface", error = %err, "draw failed");
        }
    }
}

impl DisplaySurface for TerminalSurface {
    fn render(&mut self, ledger: &Ledger, pane: &PaneStyle) {
        let width = self.terminal.size().map(|size| size.width).unwrap_or(80);
        self.screen = layout(ledger, pane, width);
        self.draw();
    }

    fn apply(&mut self, effect: SurfaceEffect) {
        trace!(target = "textterm.surface", effect = ?effect, "surface effect");
        match effect {
            SurfaceEffect::FocusInput | SurfaceEffect::MoveCaretToEnd => {
                if !self.focused {
                    self.focused = true;
                    self.draw();
                }
            }
            // the tail is always in view
            SurfaceEffect::ScrollToEnd => {}
        }
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        self.terminal.show_cursor().ok();
        disable_raw_mode().ok();
        execute!(
            self.terminal.backend_mut(),
            DisableMouseCapture,
            DisableBracketedPaste,
            LeaveAlternateScreen
        )
        .ok();
    }
}
