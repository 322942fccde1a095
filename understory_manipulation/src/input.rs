// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routing of keyboard and wheel messages to a viewport.

use bitflags::bitflags;

use crate::configuration::Configuration;
use crate::engine::ContactId;

/// Keys the engine understands for panning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Home.
    Home,
    /// End.
    End,
    /// Any other key, identified by its platform code.
    Other(u32),
}

bitflags! {
    /// Keyboard modifiers held while a message was produced.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 0x01;
        /// Control.
        const CTRL = 0x02;
        /// Alt.
        const ALT = 0x04;
    }
}

/// A message delivered to a viewport.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputMessage {
    /// A key press.
    KeyDown {
        /// The key.
        key: Key,
        /// Held modifiers.
        modifiers: Modifiers,
        /// Whether this is the platform's secondary ("system") key message.
        system: bool,
    },
    /// A mouse wheel notch.
    Wheel {
        /// Pointer that produced the wheel message.
        pointer: u32,
        /// Wheel delta, positive away from the user.
        delta: f64,
        /// `true` for a horizontal wheel.
        horizontal: bool,
    },
}

impl InputMessage {
    /// The pseudo contact the message is routed through.
    #[must_use]
    pub fn contact(&self) -> ContactId {
        match self {
            Self::KeyDown { .. } => ContactId::KEYBOARD,
            Self::Wheel { .. } => ContactId::MOUSE,
        }
    }
}

/// Pan axis a message resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PanRouting {
    /// Not a pan key; forwarded unchanged.
    Passthrough,
    /// A horizontal pan.
    Horizontal,
    /// A vertical pan.
    Vertical,
    /// A pan along an axis the viewport cannot move on; dropped.
    Dropped,
}

/// Decides which pan axis a key message drives.
///
/// Arrow keys are bound to their axis. Page, Home and End keys are ambiguous:
/// they pan vertically, unless only horizontal panning is possible or both
/// axes are possible and Ctrl is held.
#[must_use]
pub fn classify(message: &InputMessage, active: Configuration) -> PanRouting {
    let InputMessage::KeyDown { key, modifiers, .. } = *message else {
        return PanRouting::Passthrough;
    };
    let pan_x = active.contains(Configuration::PAN_X);
    let pan_y = active.contains(Configuration::PAN_Y);
    match key {
        Key::Left | Key::Right if pan_x => PanRouting::Horizontal,
        Key::Up | Key::Down if pan_y => PanRouting::Vertical,
        Key::Left | Key::Right | Key::Up | Key::Down => PanRouting::Dropped,
        Key::PageUp | Key::PageDown | Key::Home | Key::End => match (pan_x, pan_y) {
            (false, false) => PanRouting::Dropped,
            (true, true) if modifiers.contains(Modifiers::CTRL) => PanRouting::Horizontal,
            (true, false) => PanRouting::Horizontal,
            _ => PanRouting::Vertical,
        },
        Key::Other(_) => PanRouting::Passthrough,
    }
}

/// Mirrors a horizontal pan key for right-to-left flow.
#[must_use]
pub fn mirror_for_rtl(message: InputMessage) -> InputMessage {
    match message {
        InputMessage::KeyDown {
            key,
            modifiers,
            system,
        } => {
            let key = match key {
                Key::Left => Key::Right,
                Key::Right => Key::Left,
                Key::PageUp => Key::PageDown,
                Key::PageDown => Key::PageUp,
                Key::Home => Key::End,
                Key::End => Key::Home,
                other => other,
            };
            InputMessage::KeyDown {
                key,
                modifiers,
                system,
            }
        }
        wheel @ InputMessage::Wheel { .. } => wheel,
    }
}

/// Resolves the message to forward to the engine, or `None` to drop it.
#[must_use]
pub fn route(
    message: InputMessage,
    active: Configuration,
    right_to_left: bool,
) -> Option<InputMessage> {
    match classify(&message, active) {
        PanRouting::Dropped => None,
        PanRouting::Horizontal if right_to_left => Some(mirror_for_rtl(message)),
        _ => Some(message),
    }
}

/// Result of asking the engine to track a contact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ContactOutcome {
    /// The contact is tracked.
    Tracked,
    /// The contact was already tracked or vanished before the engine saw it.
    Failed,
}
