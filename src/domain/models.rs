use std::fmt;

/// Logical keys sampled every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Esc,
}

impl Key {
    pub const ALL: [Key; 5] = [Key::Left, Key::Right, Key::Up, Key::Down, Key::Esc];
}

/// Pressed / not-pressed state of every [`Key`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub esc: bool,
}

impl KeySnapshot {
    /// Build a snapshot with the given keys held.
    pub fn with(keys: &[Key]) -> Self {
        let mut snapshot = Self::default();
        for key in keys {
            snapshot.set(*key, true);
        }
        snapshot
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        match key {
            Key::Left => self.left,
            Key::Right => self.right,
            Key::Up => self.up,
            Key::Down => self.down,
            Key::Esc => self.esc,
        }
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        match key {
            Key::Left => self.left = pressed,
            Key::Right => self.right = pressed,
            Key::Up => self.up = pressed,
            Key::Down => self.down = pressed,
            Key::Esc => self.esc = pressed,
        }
    }
}

/// Battery percentage as reported by the first byte of the battery
/// characteristic. Values above 100 are passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryLevel(pub u8);

impl BatteryLevel {
    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
