//! Discovery of the filesystem roots a scan starts from.
//!
//! Platform specifics live behind [`RootDiscovery`]. The two concrete variants are
//! [`PosixMounts`] (`/` plus conventional mount points) and [`WindowsDrives`] (attached
//! logical drives filtered by drive type). [`discoverer_for`] picks one from a
//! [`Platform`] tag; nothing else in the crate looks at the running OS.
//!
//! Discovery never fails. A query that errors simply leaves that root out.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Parent directories whose immediate subdirectories are treated as mount points
pub const MOUNT_PARENTS: &[&str] = &["/mnt", "/media", "/Volumes"];

/// Enumerates starting roots for a scan
pub trait RootDiscovery {
    fn enumerate(&self) -> Vec<PathBuf>;
}

/// The OS family a discoverer targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }
}

/// Returns the discoverer for a platform
pub fn discoverer_for(platform: Platform) -> Box<dyn RootDiscovery> {
    match platform {
        Platform::Windows => Box::new(WindowsDrives::new(system_probe())),
        Platform::Posix => Box::new(PosixMounts::default()),
    }
}

/// Discovers the roots of the running system
pub fn discover_roots() -> Vec<PathBuf> {
    discoverer_for(Platform::current()).enumerate()
}

/// Uses the explicit override list when one is given, otherwise discovers roots
pub fn resolve_roots(overrides: Option<&[PathBuf]>) -> Vec<PathBuf> {
    match overrides {
        Some(roots) if !roots.is_empty() => {
            debug!("Using {} caller-supplied roots", roots.len());
            roots.to_vec()
        }
        _ => discover_roots(),
    }
}

/// `/` plus every real (non-symlink) directory directly under the mount parents
#[derive(Debug, Clone)]
pub struct PosixMounts {
    mount_parents: Vec<PathBuf>,
}

impl Default for PosixMounts {
    fn default() -> Self {
        Self::with_parents(MOUNT_PARENTS.iter().map(PathBuf::from))
    }
}

impl PosixMounts {
    pub fn with_parents(parents: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            mount_parents: parents.into_iter().collect(),
        }
    }

    fn mounts_under(parent: &Path) -> Vec<PathBuf> {
        if !parent.is_dir() {
            return Vec::new();
        }
        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list mount parent {}: {}", parent.display(), e);
                return Vec::new();
            }
        };
        entries
            .filter_map(Result::ok)
            // DirEntry::file_type does not follow symlinks
            .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
            .map(|entry| entry.path())
            .collect()
    }
}

impl RootDiscovery for PosixMounts {
    fn enumerate(&self) -> Vec<PathBuf> {
        let mut roots = BTreeSet::new();
        roots.insert(PathBuf::from("/"));
        for parent in &self.mount_parents {
            for mount in Self::mounts_under(parent) {
                trace!("Found mount point {}", mount.display());
                roots.insert(mount);
            }
        }
        roots.into_iter().collect()
    }
}

/// Win32 drive types as reported by `GetDriveTypeW`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    Unknown,
    NoRootDir,
    Removable,
    Fixed,
    Remote,
    CdRom,
    RamDisk,
}

impl DriveKind {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => DriveKind::NoRootDir,
            2 => DriveKind::Removable,
            3 => DriveKind::Fixed,
            4 => DriveKind::Remote,
            5 => DriveKind::CdRom,
            6 => DriveKind::RamDisk,
            _ => DriveKind::Unknown,
        }
    }

    /// Fixed, removable and network drives are scanned; everything else is not
    pub fn is_scannable(self) -> bool {
        matches!(
            self,
            DriveKind::Fixed | DriveKind::Removable | DriveKind::Remote
        )
    }
}

/// Low-level drive queries, split out so drive selection can be exercised anywhere
pub trait DriveProbe {
    /// Bitmask of attached drive letters, bit 0 = `A:`
    fn logical_drives(&self) -> u32;
    /// Type of the drive rooted at e.g. `C:\`, `None` if the query failed
    fn drive_kind(&self, root: &str) -> Option<DriveKind>;
}

/// Attached logical drives that are fixed, removable or remote
#[derive(Debug)]
pub struct WindowsDrives<P> {
    probe: P,
}

impl<P: DriveProbe> WindowsDrives<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }
}

impl<P: DriveProbe> RootDiscovery for WindowsDrives<P> {
    fn enumerate(&self) -> Vec<PathBuf> {
        let mask = self.probe.logical_drives();
        (0..26u8)
            .filter(|bit| mask & (1 << bit) != 0)
            .map(|bit| format!("{}:\\", char::from(b'A' + bit)))
            .filter(|root| match self.probe.drive_kind(root) {
                Some(kind) if kind.is_scannable() => true,
                Some(kind) => {
                    trace!("Skipping drive {} ({:?})", root, kind);
                    false
                }
                None => {
                    debug!("Drive type query failed for {}", root);
                    false
                }
            })
            .map(PathBuf::from)
            .collect()
    }
}

/// Drive queries against the Win32 API
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Probe;

#[cfg(windows)]
impl DriveProbe for Win32Probe {
    fn logical_drives(&self) -> u32 {
        // SAFETY: GetLogicalDrives takes no arguments and only reads process state
        unsafe { windows_sys::Win32::Storage::FileSystem::GetLogicalDrives() }
    }

    fn drive_kind(&self, root: &str) -> Option<DriveKind> {
        let wide: Vec<u16> = root.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call
        let raw = unsafe { windows_sys::Win32::Storage::FileSystem::GetDriveTypeW(wide.as_ptr()) };
        match DriveKind::from_raw(raw) {
            DriveKind::Unknown => None,
            kind => Some(kind),
        }
    }
}

#[cfg(windows)]
fn system_probe() -> Win32Probe {
    Win32Probe
}

/// Stand-in on systems without drive letters; reports no drives
#[cfg(not(windows))]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDrives;

#[cfg(not(windows))]
impl DriveProbe for NoDrives {
    fn logical_drives(&self) -> u32 {
        0
    }

    fn drive_kind(&self, _root: &str) -> Option<DriveKind> {
        None
    }
}

#[cfg(not(windows))]
fn system_probe() -> NoDrives {
    NoDrives
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct FakeProbe {
        mask: u32,
        kinds: HashMap<&'static str, DriveKind>,
    }

    impl DriveProbe for FakeProbe {
        fn logical_drives(&self) -> u32 {
            self.mask
        }

        fn drive_kind(&self, root: &str) -> Option<DriveKind> {
            self.kinds.get(root).copied()
        }
    }

    #[test]
    fn test_windows_drive_selection() {
        // A, C, D, E, F, R, Z attached
        let mask = (1 << 0) | (1 << 2) | (1 << 3) | (1 << 4) | (1 << 5) | (1 << 17) | (1 << 25);
        let kinds = HashMap::from([
            ("A:\\", DriveKind::Removable),
            ("C:\\", DriveKind::Fixed),
            ("D:\\", DriveKind::CdRom),
            ("E:\\", DriveKind::RamDisk),
            ("F:\\", DriveKind::NoRootDir),
            ("Z:\\", DriveKind::Remote),
            // R: query fails
        ]);
        let drives = WindowsDrives::new(FakeProbe { mask, kinds }).enumerate();
        assert_eq!(
            drives,
            vec![
                PathBuf::from("A:\\"),
                PathBuf::from("C:\\"),
                PathBuf::from("Z:\\")
            ]
        );
    }

    #[test]
    fn test_drive_kind_from_raw() {
        assert_eq!(DriveKind::from_raw(3), DriveKind::Fixed);
        assert_eq!(DriveKind::from_raw(5), DriveKind::CdRom);
        assert_eq!(DriveKind::from_raw(42), DriveKind::Unknown);
        assert!(!DriveKind::Unknown.is_scannable());
        assert!(DriveKind::Remote.is_scannable());
    }

    #[test]
    fn test_posix_mounts() {
        let dir = tempdir().unwrap();
        let mnt = dir.path().join("mnt");
        let media = dir.path().join("media");
        fs::create_dir_all(mnt.join("usb")).unwrap();
        fs::create_dir_all(mnt.join("backup")).unwrap();
        fs::write(mnt.join("not-a-mount.txt"), "x").unwrap();
        fs::create_dir_all(media.join("cdrom")).unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(mnt.join("usb"), mnt.join("usb-link")).unwrap();

        let discovery = PosixMounts::with_parents(vec![
            mnt.clone(),
            media.clone(),
            dir.path().join("Volumes"), // does not exist
        ]);
        let roots = discovery.enumerate();

        assert_eq!(
            roots,
            vec![
                PathBuf::from("/"),
                media.join("cdrom"),
                mnt.join("backup"),
                mnt.join("usb"),
            ]
        );
    }

    #[test]
    fn test_resolve_roots_prefers_overrides() {
        let overrides = vec![PathBuf::from("/data"), PathBuf::from("/srv")];
        assert_eq!(resolve_roots(Some(&overrides)), overrides);
    }

    #[test]
    fn test_platform_discoverer_never_panics() {
        let roots = discover_roots();
        if Platform::current() == Platform::Posix {
            assert_eq!(roots.first(), Some(&PathBuf::from("/")));
        }
    }
}
