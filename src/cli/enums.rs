//! CLI enum types.

use clap::ValueEnum;

use theremin::gesture::Modality;

/// Body signal a sensor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModalityArg {
    /// Pinch-drag with one hand
    #[default]
    Hand,
    /// Iris position
    Gaze,
}

impl From<ModalityArg> for Modality {
    fn from(m: ModalityArg) -> Self {
        match m {
            ModalityArg::Hand => Modality::Hand,
            ModalityArg::Gaze => Modality::Gaze,
        }
    }
}
