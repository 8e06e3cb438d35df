//! Action enum: user intents and the follow-ups of finished store calls.

use std::path::PathBuf;

use airwave_proto::model::{RadioStation, UserWithRole};

use crate::notify::Severity;
use crate::route::Route;
use crate::stores::admin::StationForm;
use crate::stores::identity::ProfileEdit;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Header,
    StationList,
    StationDetail,
    Comments,
    PlayerBar,
    AuthForm,
    ProfileForm,
    AdminPanel,
    ConfirmDialog,
    HelpOverlay,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    /// Play `station`, or toggle it when it is already current.
    PlayStation(RadioStation),
    TogglePlay,
    Volume(f32),
    Mute,
    Stop,
    StartSleep(u32),
    CancelSleep,

    // ── Navigation ───────────────────────────────────────────────────────────
    Navigate(Route),
    Back,
    FocusNext,
    FocusPrev,
    FocusPane(ComponentId),
    CloseFilter,

    // ── Library ──────────────────────────────────────────────────────────────
    ToggleFavorite(String),
    PostComment {
        station_id: String,
        content: String,
    },
    DeleteComment {
        station_id: String,
        comment_id: String,
    },
    CommentPosted,

    // ── Identity ─────────────────────────────────────────────────────────────
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        confirm: String,
        name: Option<String>,
    },
    SignInOAuth(String),
    /// The provider's authorize URL; the callback URL is pasted back.
    OAuthPending(String),
    CompleteOAuth(String),
    SignedIn,
    /// Sign-up went through but the account must be confirmed first.
    ConfirmationSent,
    SignOut,
    SaveProfile(ProfileEdit),
    ProfileSaved,
    UploadAvatar(PathBuf),

    // ── Admin ────────────────────────────────────────────────────────────────
    SaveStation {
        id: Option<String>,
        form: StationForm,
    },
    StationSaved,
    DeleteStation(RadioStation),
    UploadStationImage(PathBuf),
    StationImageUploaded(String),
    LoadUsers,
    GrantAdmin(UserWithRole),
    RevokeAdmin(UserWithRole),

    // ── UI ───────────────────────────────────────────────────────────────────
    /// Ask before running a destructive action.
    AskConfirm {
        message: String,
        action: Box<Action>,
    },
    ToggleHelp,
    ToggleKeys,
    CopyToClipboard(String),
    Toast(Severity, String),
    Quit,
    Noop,
}
