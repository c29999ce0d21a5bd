use serde::Serialize;

use crate::schemas::quiz::{Role, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Start,
    Answer,
    Result,
    Restricted,
    Edit,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Start => "start",
            Mode::Answer => "answer",
            Mode::Result => "result",
            Mode::Restricted => "restricted",
            Mode::Edit => "edit",
        }
    }
}

/// Resolved interaction state for one viewer on one quiz screen.
///
/// `reveal_correctness` is the only gate the presentation layer may consult
/// before showing which alternative is right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeResolution {
    pub mode: Mode,
    pub locked: bool,
    pub reveal_correctness: bool,
}

impl ModeResolution {
    fn open(mode: Mode) -> Self {
        Self { mode, locked: false, reveal_correctness: false }
    }

    pub fn allows_responses(&self) -> bool {
        self.mode == Mode::Answer && !self.locked
    }
}

pub fn resolve_mode(
    role: Role,
    visibility: Visibility,
    concluded: bool,
    attempt_loaded: bool,
) -> ModeResolution {
    if role == Role::Teacher {
        return ModeResolution::open(Mode::Edit);
    }

    match visibility {
        Visibility::Draft => ModeResolution::open(Mode::Restricted),
        Visibility::Archived => {
            ModeResolution { mode: Mode::Result, locked: true, reveal_correctness: true }
        }
        Visibility::Public if concluded => {
            ModeResolution { mode: Mode::Answer, locked: true, reveal_correctness: true }
        }
        Visibility::Public if !attempt_loaded => ModeResolution::open(Mode::Start),
        Visibility::Public => ModeResolution::open(Mode::Answer),
    }
}
