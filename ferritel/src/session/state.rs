//! Session state machine: raw-mode login detection, then line mode.

use log::{debug, trace};

use crate::channel::{LoginAction, LoginRules, PatternBuffer};

/// How received data is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Scanning raw bytes for login prompts.
    Raw,

    /// Delivering lines to the expect engine.
    Line,
}

/// Drives the login exchange. Starts in `Raw`, moves to `Line` once and
/// never back.
#[derive(Debug)]
pub struct LoginStateMachine {
    mode: Mode,
    rules: LoginRules,
    window: PatternBuffer,
}

impl LoginStateMachine {
    pub fn new(rules: LoginRules, window: PatternBuffer) -> Self {
        Self {
            mode: Mode::Raw,
            rules,
            window,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Scan a raw chunk and return the action of the first matching rule.
    ///
    /// At most one action is taken per chunk. The window is cleared after
    /// every action, and bytes seen in raw mode are never replayed as lines.
    pub fn on_raw(&mut self, chunk: &[u8]) -> Option<LoginAction> {
        if self.mode == Mode::Line {
            return None;
        }

        self.window.extend(chunk);
        let (name, rule) = self.rules.first_match(self.window.as_slice())?;
        let action = rule.action;
        trace!("login rule {:?} matched {:?}", name, self.window.as_str_lossy());
        self.window.clear();

        if action == LoginAction::Ready {
            debug!("login complete, switching to line mode");
            self.mode = Mode::Line;
        }
        Some(action)
    }
}
