use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyModifiers, MouseButton,
    MouseEventKind,
};
use textterm_core::{EngineHandle, InputEvent, KeyEvent, Modifiers};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Keystroke(KeyEvent),
    Pointer(InputEvent),
    Paste(String),
    Refresh,
    Quit,
    Ignore,
}

/// Translates a terminal event into what the engine understands. Ctrl+D is
/// reserved for leaving the console.
pub fn map_event(event: &Event) -> Mapped {
    match event {
        Event::Key(key) => map_key(key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Up(MouseButton::Left) => Mapped::Pointer(InputEvent::PointerUp {
                has_selection: false,
                input_focused: false,
            }),
            _ => Mapped::Ignore,
        },
        Event::Paste(text) => Mapped::Paste(text.clone()),
        Event::Resize(_, _) => Mapped::Refresh,
        _ => Mapped::Ignore,
    }
}

fn map_key(key: &TermKeyEvent) -> Mapped {
    if key.kind == KeyEventKind::Release {
        return Mapped::Ignore;
    }
    let modifiers = Modifiers {
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
        alt: key.modifiers.contains(KeyModifiers::ALT),
    };
    if key.code == KeyCode::Char('d') && key.modifiers == KeyModifiers::CONTROL {
        return Mapped::Quit;
    }
    let (produced, code) = match key.code {
        KeyCode::Char(c) => (Some(c), char_code(c)),
        KeyCode::Enter => (Some('\r'), 13),
        KeyCode::Backspace => (None, 8),
        KeyCode::Tab => (None, 9),
        KeyCode::Esc => (None, 27),
        KeyCode::PageUp => (None, 33),
        KeyCode::PageDown => (None, 34),
        KeyCode::End => (None, 35),
        KeyCode::Home => (None, 36),
        KeyCode::Left => (None, 37),
        KeyCode::Up => (None, 38),
        KeyCode::Right => (None, 39),
        KeyCode::Down => (None, 40),
        KeyCode::Insert => (None, 45),
        KeyCode::Delete => (None, 46),
        KeyCode::F(n) if (1..=12).contains(&n) => (None, 111 + u32::from(n)),
        _ => return Mapped::Ignore,
    };
    Mapped::Keystroke(KeyEvent::new(produced, code, modifiers))
}

/// Browser-style key code: letters map to their uppercase ASCII value.
fn char_code(c: char) -> u32 {
    if c.is_ascii_alphabetic() {
        u32::from(c.to_ascii_uppercase())
    } else {
        u32::from(c)
    }
}

/// Reads terminal events on a dedicated thread until the engine goes away or
/// the user quits.
pub fn spawn_input_thread(handle: EngineHandle) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("textterm-input".into())
        .spawn(move || pump(handle))
}

/// Waits for the input thread and reports the message it panicked with.
pub fn join_input_thread(thread: JoinHandle<()>) -> Option<String> {
    let panic = thread.join().err()?;
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!(target = "textterm.input", panic = %message, "input thread panicked");
    Some(message)
}

fn pump(handle: EngineHandle) {
    while !handle.is_closed() {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                warn!(target = "textterm.input", error = %err, "cannot poll terminal events");
                break;
            }
        }
        let event = match event::read() {
            Ok(event) => event,
            Err(err) => {
                warn!(target = "textterm.input", error = %err, "cannot read terminal event");
                break;
            }
        };
        let sent = match map_event(&event) {
            Mapped::Keystroke(key) => handle.keystroke(key),
            Mapped::Pointer(pointer) => handle.input(pointer),
            Mapped::Paste(text) => handle.paste(text),
            Mapped::Refresh => handle.refresh(),
            Mapped::Quit => {
                debug!(target = "textterm.input", "quit requested");
                let _ = handle.terminate();
                break;
            }
            Mapped::Ignore => Ok(()),
        };
        if sent.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(TermKeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn ctrl_letters_keep_browser_codes() {
        assert_eq!(
            map_event(&key(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            Mapped::Keystroke(KeyEvent::new(Some('q'), 81, Modifiers::ctrl()))
        );
    }

    #[test]
    fn named_keys() {
        assert_eq!(
            map_event(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Mapped::Keystroke(KeyEvent::enter())
        );
        assert_eq!(
            map_event(&key(KeyCode::Up, KeyModifiers::NONE)),
            Mapped::Keystroke(KeyEvent::code(38))
        );
        assert_eq!(
            map_event(&key(KeyCode::F(1), KeyModifiers::NONE)),
            Mapped::Keystroke(KeyEvent::code(112))
        );
    }

    #[test]
    fn ctrl_d_quits_and_releases_are_ignored() {
        assert_eq!(map_event(&key(KeyCode::Char('d'), KeyModifiers::CONTROL)), Mapped::Quit);
        let release = Event::Key(TermKeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(map_event(&release), Mapped::Ignore);
    }

    #[test]
    fn joining_reports_an_input_thread_panic() {
        let clean = thread::spawn(|| {});
        assert_eq!(join_input_thread(clean), None);

        let failed = thread::spawn(|| panic!("terminal went away"));
        assert_eq!(join_input_thread(failed).as_deref(), Some("terminal went away"));
    }

    #[test]
    fn left_click_release_refocuses() {
        let up = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert!(matches!(map_event(&up), Mapped::Pointer(InputEvent::PointerUp { .. })));
        assert_eq!(map_event(&Event::Resize(80, 24)), Mapped::Refresh);
    }
}
