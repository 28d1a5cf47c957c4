use crate::audit::AuditLog;
use crate::color;
use crate::session::{Session, SessionState};
use crate::sync::GridSnapshot;
use crate::{GRID_SQUARES, GRID_WIDTH, short_address};
use color_eyre::eyre::{Result, eyre};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use tokio::sync::mpsc;

pub enum UserEvent {
    Quit,
    Connect,
    Disconnect,
    Refresh,
    Command(String),
    Redraw,
}

/// Everything the renderer needs, borrowed from the app for one frame.
pub struct AppView<'a> {
    pub session: &'a Session,
    pub state: SessionState,
    pub snapshot: Option<&'a GridSnapshot>,
    pub is_owner: bool,
    pub deposit_label: String,
    pub audit: &'a AuditLog,
    pub status: &'a str,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    selected: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            selected: 0,
            terminal: None,
        }
    }
}

impl UiState {
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Drop per-chain interaction state while keeping the terminal session.
    pub fn reset(&mut self) {
        self.mode = Mode::Normal;
        self.selected = 0;
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    Command {
        buffer: String,
    },
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

/// Blocking crossterm reads happen on a dedicated thread so the async loop
/// can select over input and timers together. The thread lives for the
/// whole process; call this once.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    events
        .recv()
        .await
        .ok_or_else(|| eyre!("input event stream closed"))
}

/// Translate one raw terminal event into a user intent, if any.
pub fn interpret_event(state: &mut UiState, raw: Event) -> Option<UserEvent> {
    let Event::Key(key) = raw else {
        return Some(UserEvent::Redraw);
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match &mut state.mode {
        Mode::Command { buffer } => {
            let event = interpret_command_key(buffer, key);
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                state.mode = Mode::Normal;
            }
            event
        }
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Char('c') => Some(UserEvent::Connect),
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            KeyCode::Char(':') => {
                state.mode = Mode::Command {
                    buffer: String::new(),
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Left | KeyCode::Char('h') => {
                if state.selected % GRID_WIDTH > 0 {
                    state.selected -= 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if state.selected % GRID_WIDTH < GRID_WIDTH - 1 {
                    state.selected += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if state.selected >= GRID_WIDTH {
                    state.selected -= GRID_WIDTH;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if state.selected + GRID_WIDTH < GRID_SQUARES {
                    state.selected += GRID_WIDTH;
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

fn interpret_command_key(buffer: &mut String, key: KeyEvent) -> Option<UserEvent> {
    match key.code {
        KeyCode::Esc => Some(UserEvent::Redraw),
        KeyCode::Enter => {
            let text = std::mem::take(buffer);
            Some(UserEvent::Command(text))
        }
        KeyCode::Backspace => {
            buffer.pop();
            Some(UserEvent::Redraw)
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            Some(UserEvent::Redraw)
        }
        _ => None,
    }
}

pub fn draw(state: &mut UiState, view: &AppView) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, view: &AppView) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // wallet status
            Constraint::Length(22), // grid
            Constraint::Min(8),     // account + history
            Constraint::Length(3),  // status / command line
        ])
        .split(f.area());

    draw_top(f, chunks[0], view);
    draw_grid(f, chunks[1], state, view);
    draw_lower(f, chunks[2], view);
    draw_bottom(f, chunks[3], state, view);
}

fn draw_top(f: &mut Frame, area: Rect, view: &AppView) {
    let wallet = match (&view.state, view.session.address.as_deref()) {
        (SessionState::Connecting, _) => String::from("Connecting..."),
        (SessionState::Connected, Some(address)) => {
            format!("{} on {}", short_address(address), view.session.network)
        }
        _ => String::from("Not connected (press 'c')"),
    };
    let gauge = Paragraph::new(format!(
        "Buy Earth | Wallet: {wallet} | Square price: {}",
        crate::tx::square_price_label()
    ))
    .style(Style::default())
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(gauge, area);
}

fn draw_grid(f: &mut Frame, area: Rect, state: &UiState, view: &AppView) {
    let selected_color = view
        .snapshot
        .and_then(|s| s.squares.get(state.selected).copied())
        .unwrap_or(0);
    let title = format!(
        "Earth (square {}: {})",
        state.selected,
        color::to_hex(selected_color)
    );
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = GRID_WIDTH as u16;
    let col_w = inner.width / cols;
    let row_h = inner.height / cols;
    if col_w == 0 || row_h == 0 {
        return;
    }
    for index in 0..GRID_SQUARES {
        let c = (index % GRID_WIDTH) as u16;
        let r = (index / GRID_WIDTH) as u16;
        let rect = Rect::new(inner.x + c * col_w, inner.y + r * row_h, col_w, row_h);
        let value = view
            .snapshot
            .and_then(|s| s.squares.get(index).copied())
            .unwrap_or(0);
        let (red, green, blue) = color::rgb(value);
        let selected = index == state.selected;
        let style = if selected {
            Style::default()
                .bg(Color::Rgb(red, green, blue))
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Color::Rgb(red, green, blue))
        };
        let label = if selected {
            format!("[{index}]")
        } else {
            format!("{index}")
        };
        f.render_widget(Paragraph::new(label).style(style), rect);
    }
}

fn draw_lower(f: &mut Frame, area: Rect, view: &AppView) {
    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let mut account_lines = vec![];
    match view.snapshot {
        Some(snapshot) => {
            account_lines.push(Line::from(format!(
                "Contract owner: {}",
                short_address(&snapshot.owner)
            )));
            account_lines.push(Line::from(format!("Your deposit: {}", view.deposit_label)));
            if view.is_owner {
                account_lines.push(Line::styled(
                    "You are the owner",
                    Style::default().fg(Color::Green),
                ));
            }
        }
        None => account_lines.push(Line::styled(
            "No chain data yet (press 'r' to refresh)",
            Style::default().fg(Color::DarkGray),
        )),
    }
    let account =
        Paragraph::new(account_lines).block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(account, lower[0]);

    let mut history_lines = vec![];
    if view.audit.is_empty() {
        history_lines.push(Line::styled("None", Style::default().fg(Color::DarkGray)));
    } else {
        for entry in view.audit.entries() {
            history_lines.push(Line::from(format!(
                "{} | {} | {}",
                entry.timestamp, entry.kind, entry.details
            )));
        }
    }
    let history = Paragraph::new(history_lines)
        .block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(history, lower[1]);
}

fn draw_bottom(f: &mut Frame, area: Rect, state: &UiState, view: &AppView) {
    let (text, title) = match &state.mode {
        Mode::Command { buffer } => (format!(":{buffer}"), "Command (Enter=run Esc=cancel)"),
        Mode::Normal => (
            format!(
                "{} | arrows=select :=command c=connect d=disconnect r=refresh q=quit",
                view.status
            ),
            "Status",
        ),
    };
    let bar = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(bar, area);
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn interpret_event__moves_the_selection_within_the_grid() {
        let mut state = UiState::default();
        // given the top-left square, moving up or left is a no-op
        interpret_event(&mut state, press(KeyCode::Up));
        interpret_event(&mut state, press(KeyCode::Left));
        assert_eq!(state.selected(), 0);
        // when moving right then down
        interpret_event(&mut state, press(KeyCode::Right));
        interpret_event(&mut state, press(KeyCode::Down));
        // then the selection lands one row and one column in
        assert_eq!(state.selected(), GRID_WIDTH + 1);
    }

    #[test]
    fn interpret_event__command_mode_collects_a_line() {
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char(':')));
        for c in "buy #112233".chars() {
            interpret_event(&mut state, press(KeyCode::Char(c)));
        }
        let Some(UserEvent::Command(text)) = interpret_event(&mut state, press(KeyCode::Enter))
        else {
            panic!("expected a command event");
        };
        assert_eq!(text, "buy #112233");
        assert!(matches!(state.mode, Mode::Normal));
    }

    #[test]
    fn interpret_event__escape_leaves_command_mode() {
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char(':')));
        interpret_event(&mut state, press(KeyCode::Esc));
        assert!(matches!(state.mode, Mode::Normal));
        // and 'q' now quits instead of typing into a buffer
        assert!(matches!(
            interpret_event(&mut state, press(KeyCode::Char('q'))),
            Some(UserEvent::Quit)
        ));
    }
}
