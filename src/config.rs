//! Build-time table sizes and string limits.
//!
//! A deployment that needs different limits forks this file the same
//! way it would fork a config header.

/// Maximum number of live tasks.
pub const MAX_TASKS: usize = 64;
/// Maximum number of live queues.
pub const MAX_QUEUES: usize = 64;
/// Maximum number of live binary semaphores.
pub const MAX_BIN_SEMAPHORES: usize = 64;
/// Maximum number of live counting semaphores.
pub const MAX_COUNT_SEMAPHORES: usize = 64;
/// Maximum number of live mutexes.
pub const MAX_MUTEXES: usize = 64;
/// Maximum number of live volumes.
pub const MAX_VOLUMES: usize = 16;

/// Maximum length of an object/volume name, including the NUL terminator.
pub const MAX_API_NAME: usize = 32;
/// Maximum length of a virtual or local path.
pub const MAX_PATH_LEN: usize = 256;

/// Depth cap applied to the POSIX message-queue backing (`mq_maxmsg`).
pub const MQ_MAXMSG: i64 = 20;

/// Base UDP port for the datagram-socket queue backing: queue `id`
/// binds `127.0.0.1:BASE_PORT + id`.
pub const QUEUE_SOCKET_BASE_PORT: u16 = 43000;

/// Upper bound on a counting semaphore's value (a `SEM_VALUE_MAX`
/// analogue).
pub const SEM_VALUE_MAX: u32 = i32::MAX as u32;

/// Bound applied to the `os_printf!` output buffer.
pub const PRINTF_BUFFER_SIZE: usize = 256;
