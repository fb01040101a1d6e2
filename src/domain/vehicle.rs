//! Vehicle steering/speed model
//!
//! Maps one keyboard sample onto the clamped angle/speed pair and decides
//! which commands go out on the wire for that tick.

use crate::domain::models::KeySnapshot;
use std::fmt;

pub const MIN_ANGLE: u8 = 0x00;
pub const MAX_ANGLE: u8 = 0x70;
pub const ANGLE_STEP: u8 = 0x05;
/// Angle byte for straight ahead.
pub const STRAIGHT_ANGLE: u8 = 0x3E;

pub const MIN_SPEED: u8 = 0x00;
pub const MAX_SPEED: u8 = 0x09;
pub const SPEED_STEP: u8 = 0x01;
/// Speed byte for stopped.
pub const NEUTRAL_SPEED: u8 = 0x04;

/// Third command byte, always zero on this car.
pub const FIXED_BYTE: u8 = 0x00;

/// Subtracted from the angle byte when printing a command.
pub const ANGLE_DISPLAY_OFFSET: i16 = 52;

/// A single 3-byte drive command: `[angle, speed, 0x00]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCommand {
    pub angle: u8,
    pub speed: u8,
}

impl DriveCommand {
    pub const NEUTRAL: DriveCommand = DriveCommand {
        angle: STRAIGHT_ANGLE,
        speed: NEUTRAL_SPEED,
    };

    pub fn new(angle: u8, speed: u8) -> Self {
        Self { angle, speed }
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.angle, self.speed, FIXED_BYTE]
    }

    pub fn hex(&self) -> String {
        self.to_bytes().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  (angle={}, speed={})",
            self.hex(),
            self.angle as i16 - ANGLE_DISPLAY_OFFSET,
            self.speed
        )
    }
}

/// Commands produced by one tick, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub commands: Vec<DriveCommand>,
    /// Set when Esc was seen; the loop ends after sending `commands`.
    pub stop: bool,
}

/// Current angle and speed of the car.
///
/// Always within `[MIN_ANGLE, MAX_ANGLE]` and `[MIN_SPEED, MAX_SPEED]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleState {
    angle: u8,
    speed: u8,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::neutral()
    }
}

impl VehicleState {
    pub fn neutral() -> Self {
        Self {
            angle: STRAIGHT_ANGLE,
            speed: NEUTRAL_SPEED,
        }
    }

    /// Start from an arbitrary pair, clamped into range.
    pub fn new(angle: u8, speed: u8) -> Self {
        Self {
            angle: angle.clamp(MIN_ANGLE, MAX_ANGLE),
            speed: speed.clamp(MIN_SPEED, MAX_SPEED),
        }
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn reset(&mut self) {
        *self = Self::neutral();
    }

    /// Apply one keyboard sample.
    ///
    /// Releasing both Up and Down snaps speed back to neutral. Left is applied
    /// before Right and Up before Down, so when both of a pair are held the
    /// second one is applied last. A steering change is sent with neutral
    /// speed; a speed change is sent with the current angle and speed. Esc
    /// overrides everything else and yields a single neutral command.
    pub fn apply(&mut self, keys: &KeySnapshot) -> TickOutcome {
        let mut direction_changed = false;
        let mut accel_changed = false;

        if !keys.up && !keys.down {
            self.speed = NEUTRAL_SPEED;
        }

        if keys.left {
            self.angle = self.angle.saturating_sub(ANGLE_STEP).max(MIN_ANGLE);
            direction_changed = true;
        }
        if keys.right {
            self.angle = self.angle.saturating_add(ANGLE_STEP).min(MAX_ANGLE);
            direction_changed = true;
        }

        if keys.up {
            self.speed = self.speed.saturating_add(SPEED_STEP).min(MAX_SPEED);
            accel_changed = true;
        }
        if keys.down {
            self.speed = self.speed.saturating_sub(SPEED_STEP).max(MIN_SPEED);
            accel_changed = true;
        }

        if keys.esc {
            self.reset();
            return TickOutcome {
                commands: vec![DriveCommand::NEUTRAL],
                stop: true,
            };
        }

        let mut commands = Vec::with_capacity(2);
        if direction_changed {
            commands.push(DriveCommand::new(self.angle, NEUTRAL_SPEED));
        }
        if accel_changed {
            commands.push(DriveCommand::new(self.angle, self.speed));
        }

        TickOutcome {
            commands,
            stop: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Key;

    fn hold(state: &mut VehicleState, keys: &[Key], ticks: usize) -> Vec<DriveCommand> {
        let snapshot = KeySnapshot::with(keys);
        (0..ticks)
            .flat_map(|_| state.apply(&snapshot).commands)
            .collect()
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(DriveCommand::NEUTRAL.to_bytes(), [0x3E, 0x04, 0x00]);
        assert_eq!(DriveCommand::new(0x43, 0x09).to_bytes(), [0x43, 0x09, 0x00]);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(
            DriveCommand::new(0x43, 0x04).to_string(),
            "430400  (angle=15, speed=4)"
        );
        assert_eq!(
            DriveCommand::new(0x00, 0x00).to_string(),
            "000000  (angle=-52, speed=0)"
        );
    }

    #[test]
    fn test_clamping_holds_for_any_sequence() {
        let mut state = VehicleState::neutral();
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..10_000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let bits = (seed >> 16) as u8;
            let keys = KeySnapshot {
                left: bits & 0x01 != 0,
                right: bits & 0x02 != 0,
                up: bits & 0x04 != 0,
                down: bits & 0x08 != 0,
                esc: false,
            };
            let outcome = state.apply(&keys);
            assert!((MIN_ANGLE..=MAX_ANGLE).contains(&state.angle()));
            assert!((MIN_SPEED..=MAX_SPEED).contains(&state.speed()));
            for command in outcome.commands {
                assert!(command.angle <= MAX_ANGLE);
                assert!(command.speed <= MAX_SPEED);
            }
        }
    }

    #[test]
    fn test_release_snaps_speed_to_neutral() {
        for start in MIN_SPEED..=MAX_SPEED {
            let mut state = VehicleState::new(STRAIGHT_ANGLE, start);
            let outcome = state.apply(&KeySnapshot::default());
            assert_eq!(state.speed(), NEUTRAL_SPEED);
            assert!(outcome.commands.is_empty());
            assert!(!outcome.stop);
        }
    }

    #[test]
    fn test_hold_left_for_n_ticks() {
        for n in 0..20usize {
            let mut state = VehicleState::neutral();
            hold(&mut state, &[Key::Left], n);
            let expected = (STRAIGHT_ANGLE as i32 - 5 * n as i32).max(0) as u8;
            assert_eq!(state.angle(), expected, "after {} ticks", n);
        }
    }

    #[test]
    fn test_hold_accelerate_for_n_ticks() {
        for n in 0..10usize {
            let mut state = VehicleState::neutral();
            hold(&mut state, &[Key::Up], n);
            let expected = (NEUTRAL_SPEED as usize + n).min(MAX_SPEED as usize) as u8;
            assert_eq!(state.speed(), expected, "after {} ticks", n);
        }
    }

    #[test]
    fn test_right_three_ticks_sends_direction_only() {
        let mut state = VehicleState::neutral();
        let sent: Vec<[u8; 3]> = hold(&mut state, &[Key::Right], 3)
            .iter()
            .map(DriveCommand::to_bytes)
            .collect();
        assert_eq!(
            sent,
            vec![[0x43, 0x04, 0x00], [0x48, 0x04, 0x00], [0x4D, 0x04, 0x00]]
        );
    }

    #[test]
    fn test_esc_sends_single_neutral_command() {
        let mut state = VehicleState::new(0x10, 0x08);
        let outcome = state.apply(&KeySnapshot::with(&[Key::Esc, Key::Left, Key::Up]));
        assert!(outcome.stop);
        assert_eq!(outcome.commands, vec![DriveCommand::NEUTRAL]);
        assert_eq!(state, VehicleState::neutral());
    }

    #[test]
    fn test_steer_and_accelerate_same_tick() {
        let mut state = VehicleState::neutral();
        let outcome = state.apply(&KeySnapshot::with(&[Key::Left, Key::Up]));
        // Steering write carries neutral speed, the accel write follows.
        assert_eq!(
            outcome.commands,
            vec![DriveCommand::new(0x39, NEUTRAL_SPEED), DriveCommand::new(0x39, 0x05)]
        );
    }

    #[test]
    fn test_both_steering_keys_apply_left_then_right() {
        let mut state = VehicleState::new(MIN_ANGLE, NEUTRAL_SPEED);
        let outcome = state.apply(&KeySnapshot::with(&[Key::Left, Key::Right]));
        assert_eq!(state.angle(), MIN_ANGLE + ANGLE_STEP);
        assert_eq!(outcome.commands.len(), 1);

        let mut state = VehicleState::new(MAX_ANGLE, MAX_SPEED);
        state.apply(&KeySnapshot::with(&[Key::Left, Key::Right, Key::Up, Key::Down]));
        assert_eq!(state.angle(), MAX_ANGLE);
        assert_eq!(state.speed(), MAX_SPEED - SPEED_STEP);
    }

    #[test]
    fn test_new_clamps_out_of_range() {
        let state = VehicleState::new(0xFF, 0xFF);
        assert_eq!(state.angle(), MAX_ANGLE);
        assert_eq!(state.speed(), MAX_SPEED);
    }
}
