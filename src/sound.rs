//! Fire-and-forget audio capability.
//!
//! The sync engine reacts to several events with a sound cue. Playback itself
//! is external; embedders implement [`SoundPlayer`] over whatever audio stack
//! they have (or pass [`NullSound`] to stay silent). Calls never fail and are
//! never awaited.

/// A short cue the engine asks the player to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Generic interaction feedback (room joined, clue submitted).
    Click,
    /// A timed phase began (clue writing, spy guess).
    Timer,
    /// A vote-related event (voting phase, vote cast).
    Vote,
    /// A dramatic reveal (game start/end, voting results, guess result).
    SpyReveal,
}

/// Audio playback capability consumed by the reconciler.
pub trait SoundPlayer: Send + Sync + 'static {
    /// Play a one-shot cue.
    fn play(&self, cue: SoundCue);

    /// Start the in-game background music.
    fn play_music(&self) {}

    /// Stop the background music.
    fn stop_music(&self) {}
}

/// A [`SoundPlayer`] that plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSound;

impl SoundPlayer for NullSound {
    fn play(&self, _cue: SoundCue) {}
}
