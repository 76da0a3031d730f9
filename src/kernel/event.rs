/// Listener controls forwarded to the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    /// End playback; the session winds down with it.
    Stop,
}
