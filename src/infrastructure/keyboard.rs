//! Keyboard Input Module
//!
//! Samples the five driving keys. Two readers are available: the controlling
//! terminal (crossterm, any platform) and the global Windows key state.

use crate::domain::models::{Key, KeySnapshot};
use crate::domain::settings::KeyboardBackend;
use crate::error::{RemoteError, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source of key state, sampled once per control tick.
pub trait KeySource {
    fn snapshot(&mut self) -> Result<KeySnapshot>;
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn snapshot(&mut self) -> Result<KeySnapshot> {
        (**self).snapshot()
    }
}

/// Open the reader selected in settings.
pub fn open_key_source(
    backend: KeyboardBackend,
    hold_timeout: Duration,
) -> Result<Box<dyn KeySource>> {
    match backend {
        KeyboardBackend::Terminal => Ok(Box::new(TerminalKeyboard::new(hold_timeout)?)),
        #[cfg(windows)]
        KeyboardBackend::Windows => Ok(Box::new(windows_keys::WindowsKeyboard::new())),
        #[cfg(not(windows))]
        KeyboardBackend::Windows => Err(RemoteError::Config(
            "the windows keyboard backend is only available on Windows".to_string(),
        )),
    }
}

/// Map a terminal key code to a driving key. Ctrl-C counts as Esc because raw
/// mode swallows the signal.
pub fn map_key_event(event: &KeyEvent) -> Option<Key> {
    match event.code {
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Esc => Some(Key::Esc),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Esc),
        _ => None,
    }
}

/// How long a key stays held after its last auto-repeat when the terminal
/// sends no release events. Auto-repeat arrives every ~30 ms.
const REPEAT_HOLD: Duration = Duration::from_millis(150);

/// Turns a stream of press/repeat/release events into held-key state.
///
/// With release events a key is held from press to release. Without them
/// (plain terminals, where auto-repeat shows up as more presses) a lone press
/// is a one-sample tap; a press that follows the previous one within
/// `repeat_window` counts as auto-repeat and holds the key until
/// [`REPEAT_HOLD`] passes with no further repeat. A key tapped between two
/// samples still shows as pressed in the next sample.
#[derive(Debug)]
pub struct HeldKeys {
    release_events: bool,
    repeat_window: Duration,
    last_press: HashMap<Key, Instant>,
    repeating: HashMap<Key, Instant>,
    tapped: HashSet<Key>,
}

impl HeldKeys {
    pub fn new(release_events: bool, repeat_window: Duration) -> Self {
        Self {
            release_events,
            repeat_window,
            last_press: HashMap::new(),
            repeating: HashMap::new(),
            tapped: HashSet::new(),
        }
    }

    pub fn on_event(&mut self, key: Key, kind: KeyEventKind, now: Instant) {
        match kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                self.tapped.insert(key);
                let repeat = self.release_events
                    || kind == KeyEventKind::Repeat
                    || self.last_press.get(&key).is_some_and(|previous| {
                        now.saturating_duration_since(*previous) <= self.repeat_window
                    });
                self.last_press.insert(key, now);
                if repeat {
                    self.repeating.insert(key, now);
                }
            }
            KeyEventKind::Release => {
                self.last_press.remove(&key);
                self.repeating.remove(&key);
            }
        }
    }

    /// Current state; clears the tap latch.
    pub fn snapshot(&mut self, now: Instant) -> KeySnapshot {
        let mut snapshot = KeySnapshot::default();
        for key in Key::ALL {
            let held = self.repeating.get(&key).is_some_and(|seen| {
                self.release_events || now.saturating_duration_since(*seen) <= REPEAT_HOLD
            });
            snapshot.set(key, held || self.tapped.contains(&key));
        }
        self.tapped.clear();
        if !self.release_events {
            let window = self.repeat_window;
            self.repeating
                .retain(|_, seen| now.saturating_duration_since(*seen) <= REPEAT_HOLD);
            self.last_press
                .retain(|_, seen| now.saturating_duration_since(*seen) <= window);
        }
        snapshot
    }
}

/// Reads keys from the controlling terminal in raw mode.
pub struct TerminalKeyboard {
    held: HeldKeys,
    enhanced: bool,
}

impl TerminalKeyboard {
    pub fn new(hold_timeout: Duration) -> Result<Self> {
        use crossterm::event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
        use crossterm::terminal;

        terminal::enable_raw_mode().map_err(|e| RemoteError::Keyboard(e.to_string()))?;

        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
            && crossterm::execute!(
                std::io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();

        // The Windows console reports releases without the enhancement protocol.
        let release_events = enhanced || cfg!(windows);
        if release_events {
            debug!("Terminal reports key release events");
        } else {
            info!(
                "Terminal has no key release events, a lone press is one tap and presses within {:?} count as auto-repeat",
                hold_timeout
            );
        }

        Ok(Self {
            held: HeldKeys::new(release_events, hold_timeout),
            enhanced,
        })
    }
}

impl KeySource for TerminalKeyboard {
    fn snapshot(&mut self) -> Result<KeySnapshot> {
        while event::poll(Duration::ZERO).map_err(|e| RemoteError::Keyboard(e.to_string()))? {
            let ev = event::read().map_err(|e| RemoteError::Keyboard(e.to_string()))?;
            if let Event::Key(key_event) = ev {
                if let Some(key) = map_key_event(&key_event) {
                    self.held.on_event(key, key_event.kind, Instant::now());
                }
            }
        }
        Ok(self.held.snapshot(Instant::now()))
    }
}

impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = crossterm::execute!(
                std::io::stdout(),
                crossterm::event::PopKeyboardEnhancementFlags
            );
        }
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

#[cfg(windows)]
mod windows_keys {
    use super::KeySource;
    use crate::domain::models::{Key, KeySnapshot};
    use crate::error::Result;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetAsyncKeyState, VIRTUAL_KEY, VK_DOWN, VK_ESCAPE, VK_LEFT, VK_RIGHT, VK_UP,
    };

    /// Global key state, independent of which window has focus.
    pub struct WindowsKeyboard;

    impl WindowsKeyboard {
        pub fn new() -> Self {
            Self
        }

        fn virtual_key(key: Key) -> VIRTUAL_KEY {
            match key {
                Key::Left => VK_LEFT,
                Key::Right => VK_RIGHT,
                Key::Up => VK_UP,
                Key::Down => VK_DOWN,
                Key::Esc => VK_ESCAPE,
            }
        }
    }

    impl KeySource for WindowsKeyboard {
        fn snapshot(&mut self) -> Result<KeySnapshot> {
            let mut snapshot = KeySnapshot::default();
            for key in Key::ALL {
                // High bit set means the key is down right now.
                let state = unsafe { GetAsyncKeyState(Self::virtual_key(key).0 as i32) };
                snapshot.set(key, (state as u16) & 0x8000 != 0);
            }
            Ok(snapshot)
        }
    }
}
