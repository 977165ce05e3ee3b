//! The flat status enumeration returned by every public OSAL call.
//!
//! Every operation propagates failure strictly by return value — there is
//! no panicking, no unwinding, and no global `errno`-like side channel.
//! Host errors are mapped at the boundary where the host call happens;
//! signal-interrupted waits never surface here because they're recovered
//! locally by the caller (see `task::retry_on_eintr`).

use std::fmt;

/// Status code returned by every public OSAL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    Success,

    // --- Argument errors ---
    InvalidPointer,
    NameTooLong,
    InvalidPriority,
    InvalidSemValue,
    PathTooLong,
    PathInvalid,

    // --- Identity errors ---
    InvalidId,
    NameNotFound,
    NameTaken,
    NoFreeIds,

    // --- Object-kind specific ---
    QueueEmpty,
    QueueFull,
    QueueTimeout,
    QueueInvalidSize,
    SemFailure,
    SemTimeout,

    // --- General ---
    Error,
    NotImplemented,

    // --- Filesystem ---
    FsError,
    FsInvalidPointer,
    FsPathTooLong,
    FsNameTooLong,
    FsPathInvalid,
    FsDriveNotCreated,
    FsDeviceNotFree,
    FsUnimplemented,
}

impl Status {
    /// Short, all-caps token for this status, used by `GetErrorName`.
    pub const fn name(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::InvalidPointer => "INVALID_POINTER",
            Status::NameTooLong => "ERR_NAME_TOO_LONG",
            Status::InvalidPriority => "ERR_INVALID_PRIORITY",
            Status::InvalidSemValue => "ERR_INVALID_SEM_VALUE",
            Status::PathTooLong => "ERR_PATH_TOO_LONG",
            Status::PathInvalid => "ERR_PATH_INVALID",
            Status::InvalidId => "ERR_INVALID_ID",
            Status::NameNotFound => "ERR_NAME_NOT_FOUND",
            Status::NameTaken => "ERR_NAME_TAKEN",
            Status::NoFreeIds => "ERR_NO_FREE_IDS",
            Status::QueueEmpty => "QUEUE_EMPTY",
            Status::QueueFull => "QUEUE_FULL",
            Status::QueueTimeout => "QUEUE_TIMEOUT",
            Status::QueueInvalidSize => "QUEUE_INVALID_SIZE",
            Status::SemFailure => "SEM_FAILURE",
            Status::SemTimeout => "SEM_TIMEOUT",
            Status::Error => "ERROR",
            Status::NotImplemented => "ERR_NOT_IMPLEMENTED",
            Status::FsError => "FS_ERR",
            Status::FsInvalidPointer => "FS_ERR_INVALID_POINTER",
            Status::FsPathTooLong => "FS_ERR_PATH_TOO_LONG",
            Status::FsNameTooLong => "FS_ERR_NAME_TOO_LONG",
            Status::FsPathInvalid => "FS_ERR_PATH_INVALID",
            Status::FsDriveNotCreated => "FS_ERR_DRIVE_NOT_CREATED",
            Status::FsDeviceNotFree => "FS_ERR_DEVICE_NOT_FREE",
            Status::FsUnimplemented => "FS_ERR_UNIMPLEMENTED",
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}

/// `GetErrorName`: produce a short all-caps token for `code`.
pub const fn get_error_name(code: Status) -> &'static str {
    code.name()
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::error::Error for Status {}

pub type Result<T> = std::result::Result<T, Status>;

/// Map an `errno` observed after a non-restartable host call to the
/// nearest typed `Status`. Callers that can produce a more specific
/// status (e.g. `QueueFull` from `EAGAIN` on a full mqueue) should not
/// use this and instead match the errno themselves; this is the
/// catch-all for "host call failed with no more specific diagnosis".
pub(crate) fn from_errno(_e: errno::Errno) -> Status {
    Status::Error
}
