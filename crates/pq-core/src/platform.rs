//! Host platform detection.

use pq_common::PlatformKind;
use tracing::debug;

/// Kernel name as reported by `uname(2)` (e.g. `Linux`, `Darwin`, `FreeBSD`).
pub fn kernel_name() -> String {
    #[cfg(unix)]
    {
        let mut uname = std::mem::MaybeUninit::<libc::utsname>::uninit();
        let result = unsafe { libc::uname(uname.as_mut_ptr()) };
        if result == 0 {
            let uname = unsafe { uname.assume_init() };
            let sysname = unsafe {
                std::ffi::CStr::from_ptr(uname.sysname.as_ptr())
                    .to_string_lossy()
                    .to_string()
            };
            if !sysname.is_empty() {
                return sysname;
            }
        }
    }
    fallback_kernel_name().to_string()
}

/// Kernel name implied by the compile target, used when uname is unavailable.
fn fallback_kernel_name() -> &'static str {
    match std::env::consts::OS {
        "linux" | "android" => "Linux",
        "macos" | "ios" => "Darwin",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        "netbsd" => "NetBSD",
        "dragonfly" => "DragonFly",
        other => other,
    }
}

/// Classify a kernel name already read from the host.
pub fn classify(kernel: &str) -> PlatformKind {
    let kind = PlatformKind::from_kernel_name(kernel);
    debug!(kernel, platform = %kind, "detected platform");
    kind
}

/// Whether `kernel` names macOS.
pub fn is_mac_kernel(kernel: &str) -> bool {
    kernel.trim() == "Darwin"
}
