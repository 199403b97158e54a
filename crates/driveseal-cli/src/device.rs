//! Removable-device classification.
//!
//! A root qualifies when it is the mount point of a `/dev/sd*` block device
//! whose `/sys/block/<dev>` link resolves through a USB bus. On platforms
//! without that layout nothing qualifies.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
}

/// Parse the first two fields of each `/proc/mounts` line.
pub fn parse_mounts(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            Some(MountEntry {
                device: unescape(device),
                mount_point: PathBuf::from(unescape(mount_point)),
            })
        })
        .collect()
}

/// Undo the kernel's octal escapes (`\040` for space and friends).
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = octal {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `/dev/sdb1` -> `sdb`. `None` for anything that is not a SCSI disk node.
pub fn block_device_name(device: &str) -> Option<&str> {
    let name = device.strip_prefix("/dev/")?;
    if !name.starts_with("sd") {
        return None;
    }
    let end = name
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(name.len());
    Some(&name[..end])
}

/// Whether a `/sys/block` link target passes through a USB controller.
pub fn is_usb_link(target: &Path) -> bool {
    target.to_string_lossy().contains("usb")
}

/// Classify `root` using an explicit mount table and link resolver.
pub fn classify<F>(root: &Path, mounts: &[MountEntry], read_link: F) -> bool
where
    F: Fn(&Path) -> Option<PathBuf>,
{
    let Some(entry) = mounts.iter().find(|m| m.mount_point == root) else {
        return false;
    };
    let Some(name) = block_device_name(&entry.device) else {
        return false;
    };
    read_link(&Path::new("/sys/block").join(name))
        .map(|target| is_usb_link(&target))
        .unwrap_or(false)
}

/// Whether `root` is the mount point of a USB mass-storage device.
#[cfg(target_os = "linux")]
pub fn is_removable_usb(root: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string("/proc/mounts") else {
        return false;
    };
    classify(root, &parse_mounts(&contents), |link| std::fs::read_link(link).ok())
}

#[cfg(not(target_os = "linux"))]
pub fn is_removable_usb(_root: &Path) -> bool {
    false
}
