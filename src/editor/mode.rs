use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    None,
    Add,
    Erase,
    Resize,
}

impl EditMode {
    /// Modes that show the hover disc and react to ground clicks.
    pub fn targets_ground(self) -> bool {
        matches!(self, EditMode::Add | EditMode::Erase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: EditMode,
    pub to: EditMode,
}

impl ModeTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    pub fn left(&self, mode: EditMode) -> bool {
        self.from == mode && self.to != mode
    }

    pub fn entered(&self, mode: EditMode) -> bool {
        self.to == mode && self.from != mode
    }
}

/// Three radio-style toggles. Setting one flag forces the other two off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditModes {
    add: bool,
    erase: bool,
    resize: bool,
}

impl EditModes {
    pub fn current(&self) -> EditMode {
        if self.add {
            EditMode::Add
        } else if self.erase {
            EditMode::Erase
        } else if self.resize {
            EditMode::Resize
        } else {
            EditMode::None
        }
    }

    pub fn is_enabled(&self, mode: EditMode) -> bool {
        match mode {
            EditMode::None => self.current() == EditMode::None,
            EditMode::Add => self.add,
            EditMode::Erase => self.erase,
            EditMode::Resize => self.resize,
        }
    }

    /// Sets one flag. Enabling forces the other two off; enabling `None`
    /// clears all flags.
    pub fn set(&mut self, mode: EditMode, enabled: bool) -> ModeTransition {
        let from = self.current();
        match (mode, enabled) {
            (EditMode::None, true) => *self = Self::default(),
            (EditMode::None, false) => {}
            (mode, true) => {
                *self = Self::default();
                self.flag_mut(mode, true);
            }
            (mode, false) => self.flag_mut(mode, false),
        }
        ModeTransition {
            from,
            to: self.current(),
        }
    }

    pub fn enable(&mut self, mode: EditMode) -> ModeTransition {
        self.set(mode, true)
    }

    pub fn toggle(&mut self, mode: EditMode) -> ModeTransition {
        let enabled = self.is_enabled(mode);
        self.set(mode, !enabled)
    }

    fn flag_mut(&mut self, mode: EditMode, value: bool) {
        match mode {
            EditMode::Add => self.add = value,
            EditMode::Erase => self.erase = value,
            EditMode::Resize => self.resize = value,
            EditMode::None => {}
        }
    }
}
