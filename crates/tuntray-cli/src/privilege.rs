//! Elevation check
//!
//! Changing routes and adapter addresses needs administrator rights on
//! Windows and root elsewhere. Checking up front gives a clear message
//! instead of a netsh failure halfway through a start.

/// Whether the process can reconfigure the network
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::os::windows::process::CommandExt;
    use std::process::{Command, Stdio};

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    // `net session` is refused for non-administrators.
    Command::new("net")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Whether the process can reconfigure the network
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(windows, unix)))]
pub fn is_elevated() -> bool {
    false
}

/// Hint printed when the check fails
pub fn elevation_hint() -> &'static str {
    if cfg!(windows) {
        "Run tuntray from an elevated (Administrator) prompt"
    } else {
        "Run tuntray as root (for example with sudo)"
    }
}
