pub mod audio_player;
pub mod process_player;
#[cfg(feature = "rodio")]
pub mod rodio_player;

pub use audio_player::{AudioError, AudioPlayer, Playback, SilentPlayer, StartError};
pub use process_player::ProcessPlayer;
#[cfg(feature = "rodio")]
pub use rodio_player::RodioPlayer;
