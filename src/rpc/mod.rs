mod error;
pub use self::error::ApiError;

mod login;
pub use self::login::{
    LoginRequest,
    LoginResponse,
    MessageResponse,
    RegisterRequest,
    RoleUpdateRequest,
};

mod song;
pub use self::song::{
    AddSongRequest,
    HateoasLink,
    LibraryStatsResponse,
    RecommendationsResponse,
    SongObject,
    SongSetResponse,
    UploadResponse,
};

mod playback;
pub use self::playback::{
    FavoriteRequest,
    PlaybackResponse,
};
