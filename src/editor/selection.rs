use crate::scene::FlowerKey;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("selection handle is stale; the flower was deselected or removed")]
    Stale,
}

/// Published when a flower is picked in resize mode. Carries the values a
/// slider would start from; mutations go back through the editor, which
/// checks the epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionHandle {
    pub key: FlowerKey,
    pub(crate) epoch: u64,
    pub scale: f32,
    pub rotation_degrees: f32,
}

/// The single selected flower, if any.
#[derive(Debug, Default)]
pub(crate) struct Selection {
    current: Option<FlowerKey>,
    epoch: u64,
}

impl Selection {
    pub fn key(&self) -> Option<FlowerKey> {
        self.current
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn select(&mut self, key: FlowerKey) -> u64 {
        self.epoch += 1;
        self.current = Some(key);
        self.epoch
    }

    /// Drops the selection; every outstanding handle becomes stale.
    pub fn clear(&mut self) -> Option<FlowerKey> {
        self.epoch += 1;
        self.current.take()
    }

    pub fn validate(&self, handle: &SelectionHandle) -> Result<FlowerKey, SelectionError> {
        match self.current {
            Some(key) if key == handle.key && handle.epoch == self.epoch => Ok(key),
            _ => Err(SelectionError::Stale),
        }
    }
}
