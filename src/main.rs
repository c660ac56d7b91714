//! suggestbox - interactive demo of the suggestion engine
//!
//! One input line in a raw-mode terminal. Words starting with a provider's
//! trigger (`/`, `@` in the default config) get suggestions. Up/Down select,
//! Enter/Tab complete, Esc closes the list, Enter on a closed list submits,
//! Ctrl+C quits.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload};
use tui_input::{Input, InputRequest};

use suggestbox::config::{log_filter, Config, DEFAULT_LOG_FILTER};
use suggestbox::paths;
use suggestbox::selection::{KeyDisposition, KeyIntent};
use suggestbox::store::{SuggestionStore, SuggestionsChanged};
use suggestbox::terminal::{clear_below, render_field, CRLF};
use suggestbox::SuggestionBox;

const PROMPT: &str = "> ";
const MAX_ROWS: usize = 6;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(paths::config_path);

    // Log with the built-in filter while the config loads, then switch to
    // the configured one.
    let (filter, filter_handle) = reload::Layer::new(log_filter(DEFAULT_LOG_FILTER)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(&config_path).context("failed to load config")?;
    filter_handle
        .reload(log_filter(&config.log_filter)?)
        .context("failed to apply log filter")?;

    let store = Arc::new(SuggestionStore::new());
    let providers = config.providers(&Handle::current());
    info!(config = %config_path.display(), providers = ?providers.names(), "starting suggestbox");
    if providers.is_empty() {
        warn!("no providers configured, nothing will be suggested");
    }
    let mut field = SuggestionBox::mount(store.clone(), providers, config.separator.clone());

    // Async providers answer from worker threads; wake the loop to redraw.
    let redraw = Arc::new(Notify::new());
    let wake = redraw.clone();
    store.add_suggestions_listener(
        field.id(),
        Arc::new(move |_: &SuggestionsChanged| wake.notify_one()),
    )?;

    let (tx, mut keys) = mpsc::unbounded_channel();
    std::thread::spawn(move || read_keys(tx));

    terminal::enable_raw_mode().context("failed to enter raw mode")?;
    let result = run(&mut field, &mut keys, &redraw).await;
    terminal::disable_raw_mode().context("failed to leave raw mode")?;

    let mut out = std::io::stdout();
    write!(out, "{}{}", CRLF, clear_below())?;
    out.flush()?;
    result
}

/// Blocking key reader; crossterm's event source is synchronous.
fn read_keys(tx: mpsc::UnboundedSender<KeyEvent>) {
    loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.send(key).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "terminal event read failed");
                break;
            }
        }
    }
}

async fn run(
    field: &mut SuggestionBox,
    keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
    redraw: &Notify,
) -> Result<()> {
    let mut input = Input::default();
    let mut out = std::io::stdout();
    draw(&mut out, field, &input)?;

    loop {
        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else { break };
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break;
                }

                match field.on_key(KeyIntent::from(&key)) {
                    KeyDisposition::Consumed | KeyDisposition::Dismissed => {
                        // A confirmed completion replaced the text.
                        let value = field.value();
                        if value != input.value() {
                            input = Input::new(value);
                        }
                    }
                    KeyDisposition::Forward if key.code == KeyCode::Enter => {
                        if !input.value().is_empty() {
                            write!(out, "\r{}{}{}", clear_below(), input.value(), CRLF)?;
                            input.reset();
                            field.on_input("", 0);
                        }
                    }
                    KeyDisposition::Forward => {
                        if let Some(request) = edit_request(&key) {
                            input.handle(request);
                            field.on_input(input.value(), byte_cursor(&input));
                        }
                    }
                }

                draw(&mut out, field, &input)?;
                if let Some(caret) = field.after_render() {
                    let chars = input
                        .value()
                        .get(..caret)
                        .map_or_else(|| input.value().chars().count(), |s| s.chars().count());
                    input = input.with_cursor(chars);
                    draw(&mut out, field, &input)?;
                }
            }
            _ = redraw.notified() => draw(&mut out, field, &input)?,
        }
    }

    Ok(())
}

fn edit_request(key: &KeyEvent) -> Option<InputRequest> {
    if key.modifiers.contains(KeyModifiers::CONTROL) || key.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }
    Some(match key.code {
        KeyCode::Char(c) => InputRequest::InsertChar(c),
        KeyCode::Backspace => InputRequest::DeletePrevChar,
        KeyCode::Delete => InputRequest::DeleteNextChar,
        KeyCode::Left => InputRequest::GoToPrevChar,
        KeyCode::Right => InputRequest::GoToNextChar,
        KeyCode::Home => InputRequest::GoToStart,
        KeyCode::End => InputRequest::GoToEnd,
        _ => return None,
    })
}

/// tui-input counts the cursor in chars; the engine wants bytes.
fn byte_cursor(input: &Input) -> usize {
    let value = input.value();
    value
        .char_indices()
        .nth(input.cursor())
        .map_or(value.len(), |(i, _)| i)
}

fn draw(out: &mut impl Write, field: &SuggestionBox, input: &Input) -> Result<()> {
    let frame = render_field(
        PROMPT,
        input.value(),
        byte_cursor(input),
        &field.suggestions(),
        MAX_ROWS,
    );
    out.write_all(frame.as_bytes())?;
    out.flush()?;
    Ok(())
}
