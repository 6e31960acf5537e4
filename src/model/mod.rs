mod library;
mod playback;
mod song;
mod user;

pub use self::song::{
    format_size,
    Song,
    SongError,
    SongId,
    MAX_SONG_SIZE,
};
pub use self::playback::{
    format_duration,
    Playback,
    PlaybackError,
    PlaybackStatus,
};
pub use self::library::{
    Library,
    LibraryError,
    LibraryStats,
    MAX_LIBRARY_SIZE,
    MAX_SONGS,
};
pub use self::user::{
    Registration,
    Role,
    User,
    UserError,
    UserId,
};
