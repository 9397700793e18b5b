//! Platform classification.
//!
//! System utilities diverge in flags and output columns between the BSD
//! family (including Darwin) and everything else.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernel names reported by `uname -s` on BSD-family systems.
pub const BSD_KERNEL_NAMES: &[&str] = &["Darwin", "FreeBSD", "OpenBSD", "NetBSD", "DragonFly"];

/// Which family of system utilities the host ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    LinuxLike,
    BsdLike,
}

impl PlatformKind {
    /// Classify a kernel name such as `Linux`, `Darwin`, or `FreeBSD`.
    pub fn from_kernel_name(name: &str) -> Self {
        let name = name.trim();
        if BSD_KERNEL_NAMES
            .iter()
            .any(|bsd| bsd.eq_ignore_ascii_case(name))
        {
            PlatformKind::BsdLike
        } else {
            PlatformKind::LinuxLike
        }
    }

    pub fn is_bsd(self) -> bool {
        self == PlatformKind::BsdLike
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::LinuxLike => write!(f, "linux_like"),
            PlatformKind::BsdLike => write!(f, "bsd_like"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kernel_name() {
        assert_eq!(PlatformKind::from_kernel_name("Linux"), PlatformKind::LinuxLike);
        assert_eq!(PlatformKind::from_kernel_name("Darwin"), PlatformKind::BsdLike);
        assert_eq!(PlatformKind::from_kernel_name("FreeBSD"), PlatformKind::BsdLike);
        assert_eq!(PlatformKind::from_kernel_name("OpenBSD\n"), PlatformKind::BsdLike);
        assert_eq!(PlatformKind::from_kernel_name("netbsd"), PlatformKind::BsdLike);
        assert_eq!(PlatformKind::from_kernel_name("SunOS"), PlatformKind::LinuxLike);
        assert_eq!(PlatformKind::from_kernel_name(""), PlatformKind::LinuxLike);
    }

    #[test]
    fn test_display() {
        assert_eq!(PlatformKind::BsdLike.to_string(), "bsd_like");
        assert_eq!(PlatformKind::LinuxLike.to_string(), "linux_like");
    }
}
