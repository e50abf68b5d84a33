//! Host environment probing (spec.md §6 "Environment"): SDK root discovery
//! and the macOS allocator advisory, kept separate from [`super::cli`] so
//! the pure argument parsing stays free of filesystem/process access.
use std::path::PathBuf;
use std::process::Command;

use crate::target::Os;

/// Resolve the SDK root used for implicit system-include search: an
/// explicit `-isysroot` wins, then `SDKROOT`, then `xcrun --show-sdk-path`
/// on macOS. Returns `None` on Linux targets, where there is no SDK concept.
pub fn resolve_sdkroot(explicit: Option<&PathBuf>, target_os: Os) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.clone());
    }
    if target_os != Os::MacOs {
        return None;
    }
    if let Ok(v) = std::env::var("SDKROOT") {
        if !v.is_empty() {
            return Some(PathBuf::from(v));
        }
    }
    xcrun_sdk_path()
}

fn xcrun_sdk_path() -> Option<PathBuf> {
    let output = Command::new("xcrun")
        .args(["--show-sdk-path"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8(output.stdout).ok()?;
    let path = path.trim();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// `MallocNanoZone=0` works around a known interaction between the system
/// allocator's nano zone and a freshly built non-system binary on some
/// macOS releases; this only logs advice, it never mutates the caller's
/// environment.
pub fn malloc_nano_zone_advisory(target_os: Os) -> Option<&'static str> {
    if target_os != Os::MacOs {
        return None;
    }
    match std::env::var("MallocNanoZone") {
        Ok(v) if v == "0" => None,
        _ => Some("MallocNanoZone is not set to 0; set it if you see intermittent allocator crashes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_sysroot_wins() {
        let explicit = PathBuf::from("/explicit/sdk");
        assert_eq!(
            resolve_sdkroot(Some(&explicit), Os::MacOs),
            Some(explicit)
        );
    }

    #[test]
    fn linux_has_no_sdkroot() {
        assert_eq!(resolve_sdkroot(None, Os::Linux), None);
    }

    #[test]
    fn advisory_silent_off_macos() {
        assert_eq!(malloc_nano_zone_advisory(Os::Linux), None);
    }
}
