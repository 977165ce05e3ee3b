//! Virtual/local path buffers and translation.

use std::fmt;

use crate::config::MAX_PATH_LEN;
use crate::error::Status;

/// A fixed-capacity, always-`/`-rooted path.
#[derive(Clone)]
pub struct Path {
    buf: [u8; MAX_PATH_LEN],
    len: u16,
}

impl Path {
    pub fn new(s: &str) -> Result<Self, Status> {
        if s.len() >= MAX_PATH_LEN {
            return Err(Status::PathTooLong);
        }
        if !s.starts_with('/') {
            return Err(Status::PathInvalid);
        }
        let mut buf = [0u8; MAX_PATH_LEN];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self {
            buf,
            len: s.len() as u16,
        })
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for Path {}

/// `TranslatePath(virtual) → local`: rewrite the longest
/// matching mounted volume's `mount_point` prefix to its
/// `physical_device_name`. This host always has mapped prefixes rather
/// than an identity mapping, since a hosted Rust process has no
/// counterpart to the RTOS case where virtual and physical paths
/// coincide.
pub(crate) fn translate<'a>(
    virtual_path: &str,
    mounts: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<String, Status> {
    if virtual_path.len() >= MAX_PATH_LEN || !virtual_path.starts_with('/') {
        return Err(Status::PathInvalid);
    }

    let mut best: Option<(&str, &str)> = None;
    for (mount_point, physical) in mounts {
        if virtual_path.starts_with(mount_point) {
            let is_longer = best.map(|(b, _)| mount_point.len() > b.len()).unwrap_or(true);
            if is_longer {
                best = Some((mount_point, physical));
            }
        }
    }

    match best {
        Some((mount_point, physical)) => {
            Ok(format!("{physical}{}", &virtual_path[mount_point.len()..]))
        }
        None => Err(Status::PathInvalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_rooted_path() {
        assert_eq!(Path::new("rel/path"), Err(Status::PathInvalid));
    }

    #[test]
    fn translate_rewrites_longest_matching_prefix() {
        let mounts = vec![("/cf", "/tmp/ramdisk0"), ("/cf/sub", "/tmp/sub-mount")];
        let got = translate("/cf/sub/data.bin", mounts.into_iter()).unwrap();
        assert_eq!(got, "/tmp/sub-mount/data.bin");
    }

    #[test]
    fn translate_with_no_matching_mount_is_path_invalid() {
        let mounts: Vec<(&str, &str)> = vec![("/cf", "/tmp/ramdisk0")];
        assert_eq!(
            translate("/unrelated", mounts.into_iter()),
            Err(Status::PathInvalid)
        );
    }
}
