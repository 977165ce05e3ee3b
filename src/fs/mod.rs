//! Volume table and path translator: a bounded table of logical volumes
//! sharing the same registry substrate as the other object kinds, plus
//! `TranslatePath`.
//!
//! Splits each volume between a software ramdisk driver and a
//! passthrough to an already-mounted host filesystem, using `std::fs`
//! and a plain byte buffer rather than a real block device.

mod path;
mod ramdisk;

use std::path::PathBuf;

use once_cell::sync::Lazy;

pub use path::Path;
use ramdisk::RamDisk;

use crate::config::MAX_VOLUMES;
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};

enum Backing {
    Ram(RamDisk),
    FsBased(PathBuf),
}

struct VolumeRow {
    volume_name: Name,
    mount_point: Option<Path>,
    physical_device_name: Name,
    block_size: u32,
    backing: Backing,
}

static VOLUME_TABLE: Lazy<Table<VolumeRow, MAX_VOLUMES>> = Lazy::new(Table::new);

/// `mkfs(address, devname, volname, blocksize, numblocks)`: constructs
/// a software ramdisk. `address` has no counterpart on a hosted process
/// (there is no physical memory address to format in place) and is
/// accepted only for signature parity, the same way `TaskCreate`'s
/// `flags` is accepted without effect.
///
/// Formatting a pre-existing host-mounted filesystem instead of a
/// ramdisk is `mkfs_fs_based` below, since a hosted process has no
/// `address` analog for "this is already a mounted filesystem" either —
/// see DESIGN.md's Open Question decisions.
pub fn mkfs(_address: usize, devname: &str, volname: &str, blocksize: u32, numblocks: u32) -> Result<ObjId> {
    crate::assert_initialized();
    if blocksize != ramdisk::RAM_BLOCK_SIZE {
        return Err(Status::FsError);
    }
    let dev_name = Name::new(devname)?;
    let volume_name = Name::new(volname)?;

    let id = VOLUME_TABLE.reserve(dev_name)?;

    let physical_device_name = Name::new(&format!("ramdisk:{devname}")).unwrap_or(Name::empty());

    VOLUME_TABLE.fill(
        id,
        dev_name,
        ObjId::from(u32::MAX),
        VolumeRow {
            volume_name,
            mount_point: None,
            physical_device_name,
            block_size: blocksize,
            backing: Backing::Ram(RamDisk::new(numblocks)),
        },
    );
    Ok(id)
}

/// Passthrough volume backed by an already-existing host directory.
pub fn mkfs_fs_based(devname: &str, volname: &str, host_dir: &str) -> Result<ObjId> {
    crate::assert_initialized();
    let dev_name = Name::new(devname)?;
    let volume_name = Name::new(volname)?;
    let id = VOLUME_TABLE.reserve(dev_name)?;

    let physical_device_name = Name::new(host_dir).unwrap_or(Name::empty());

    VOLUME_TABLE.fill(
        id,
        dev_name,
        ObjId::from(u32::MAX),
        VolumeRow {
            volume_name,
            mount_point: None,
            physical_device_name,
            block_size: 0,
            backing: Backing::FsBased(PathBuf::from(host_dir)),
        },
    );
    Ok(id)
}

/// `rmfs(devname)`: refuses to remove a still-mounted volume.
pub fn rmfs(devname: &str) -> Status {
    let id = match VOLUME_TABLE.find_by_name(devname) {
        Ok(id) => id,
        Err(e) => return e,
    };
    let mounted = VOLUME_TABLE
        .with_row(id, |row| row.payload.mount_point.is_some())
        .unwrap_or(false);
    if mounted {
        return Status::FsDeviceNotFree;
    }
    VOLUME_TABLE.release(id);
    Status::Success
}

/// `initfs(devname)`: re-touches a ramdisk's backing store; a no-op for
/// `FsBased` volumes, which own no in-process state to reset.
pub fn initfs(devname: &str) -> Status {
    let id = match VOLUME_TABLE.find_by_name(devname) {
        Ok(id) => id,
        Err(e) => return e,
    };
    VOLUME_TABLE
        .with_row(id, |row| {
            if let Backing::Ram(disk) = &row.payload.backing {
                let _ = disk.bytes_free();
            }
        })
        .map(|_| Status::Success)
        .unwrap_or_else(|e| e)
}

/// `mount(devname, mountpoint)`.
pub fn mount(devname: &str, mountpoint: &str) -> Status {
    let path = match Path::new(mountpoint) {
        Ok(p) => p,
        Err(e) => return e,
    };
    let id = match VOLUME_TABLE.find_by_name(devname) {
        Ok(id) => id,
        Err(e) => return e,
    };
    VOLUME_TABLE
        .with_row_mut(id, |row| row.payload.mount_point = Some(path))
        .map(|_| Status::Success)
        .unwrap_or_else(|e| e)
}

/// `unmount(mountpoint)`.
pub fn unmount(mountpoint: &str) -> Status {
    let id = match VOLUME_TABLE.find_by(|row| {
        row.mount_point
            .as_ref()
            .map(|p| p.as_str() == mountpoint)
            .unwrap_or(false)
    }) {
        Some(id) => id,
        None => return Status::FsError,
    };
    VOLUME_TABLE
        .with_row_mut(id, |row| row.payload.mount_point = None)
        .map(|_| Status::Success)
        .unwrap_or_else(|e| e)
}

/// `fsBlocksFree(mountpoint)`.
pub fn fs_blocks_free(mountpoint: &str) -> Result<u32> {
    with_mounted_row(mountpoint, |row| match &row.payload.backing {
        Backing::Ram(disk) => disk.blocks_free(),
        Backing::FsBased(dir) => statvfs_blocks_free(dir).unwrap_or(0),
    })
}

/// `fsBytesFree(mountpoint)`.
pub fn fs_bytes_free(mountpoint: &str) -> Result<u64> {
    with_mounted_row(mountpoint, |row| match &row.payload.backing {
        Backing::Ram(disk) => disk.bytes_free(),
        Backing::FsBased(dir) => statvfs_bytes_free(dir).unwrap_or(0),
    })
}

/// `FS_GetPhysDriveName(devname)`.
pub fn get_phys_drive_name(devname: &str) -> Result<String> {
    let id = VOLUME_TABLE.find_by_name(devname)?;
    VOLUME_TABLE.with_row(id, |row| row.payload.physical_device_name.as_str().to_string())
}

/// `TranslatePath(virtual) → local`.
pub fn translate_path(virtual_path: &str) -> Result<String> {
    let mut mounts: Vec<(String, String)> = Vec::new();
    VOLUME_TABLE.for_each(|_id, row| {
        if let Some(mp) = &row.payload.mount_point {
            mounts.push((
                mp.as_str().to_string(),
                row.payload.physical_device_name.as_str().to_string(),
            ));
        }
    });

    path::translate(
        virtual_path,
        mounts.iter().map(|(a, b)| (a.as_str(), b.as_str())),
    )
}

fn with_mounted_row<R>(mountpoint: &str, f: impl FnOnce(&crate::registry::Row<VolumeRow>) -> R) -> Result<R> {
    let id = VOLUME_TABLE
        .find_by(|row| {
            row.mount_point
                .as_ref()
                .map(|p| p.as_str() == mountpoint)
                .unwrap_or(false)
        })
        .ok_or(Status::FsError)?;
    VOLUME_TABLE.with_row(id, f)
}

fn statvfs_blocks_free(dir: &std::path::Path) -> Option<u32> {
    statvfs(dir).map(|s| s.f_bavail as u32)
}

fn statvfs_bytes_free(dir: &std::path::Path) -> Option<u64> {
    statvfs(dir).map(|s| s.f_bavail as u64 * s.f_frsize as u64)
}

fn statvfs(dir: &std::path::Path) -> Option<libc::statvfs> {
    let cpath = std::ffi::CString::new(dir.to_str()?).ok()?;
    let mut buf: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(cpath.as_ptr(), &mut buf) };
    if ret == 0 {
        Some(buf)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkfs_mount_blocksfree_unmount_roundtrip() {
        crate::api_init();
        let id = mkfs(0, "/ram-fs-test", "RAMFSTEST", 512, 2048).unwrap();
        assert_eq!(mount("/ram-fs-test", "/cf-fs-test"), Status::Success);
        let free = fs_blocks_free("/cf-fs-test").unwrap();
        assert!(free > 0);
        assert_eq!(unmount("/cf-fs-test"), Status::Success);
        assert_eq!(rmfs("/ram-fs-test"), Status::Success);
        let _ = id;
    }

    #[test]
    fn rmfs_refuses_while_mounted() {
        crate::api_init();
        mkfs(0, "/ram-busy-test", "RAMBUSY", 512, 64).unwrap();
        mount("/ram-busy-test", "/cf-busy-test");
        assert_eq!(rmfs("/ram-busy-test"), Status::FsDeviceNotFree);
        unmount("/cf-busy-test");
        rmfs("/ram-busy-test");
    }

    #[test]
    fn mkfs_rejects_wrong_block_size() {
        crate::api_init();
        assert_eq!(mkfs(0, "/ram-bad-bs", "BAD", 4096, 10), Err(Status::FsError));
    }
}
