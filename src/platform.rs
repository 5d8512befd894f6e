//! Host platform detection.
//!
//! The flags are compile-time constants so callers can branch on them while
//! building commands (path separators, shell syntax) without any global state.

/// True on Unix-like hosts.
pub const POSIX: bool = cfg!(unix);

/// True on Windows hosts.
pub const WIN32: bool = cfg!(windows);

/// Platform family of the running host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Win32,
    Other,
}

impl Platform {
    /// The platform this crate was compiled for.
    pub const fn current() -> Self {
        if POSIX {
            Self::Posix
        } else if WIN32 {
            Self::Win32
        } else {
            Self::Other
        }
    }
}

/// Shell program and the flag that makes it run a single command string.
///
/// `/bin/sh -c` on Unix, `cmd.exe /C` on Windows (honoring `COMSPEC`).
pub fn shell_program() -> (String, &'static str) {
    #[cfg(windows)]
    {
        let comspec = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
        (comspec, "/C")
    }
    #[cfg(not(windows))]
    {
        ("/bin/sh".to_string(), "-c")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_exclusive() {
        assert!(!(POSIX && WIN32));
    }

    #[test]
    fn test_current_matches_flags() {
        match Platform::current() {
            Platform::Posix => assert!(POSIX),
            Platform::Win32 => assert!(WIN32),
            Platform::Other => assert!(!POSIX && !WIN32),
        }
    }

    #[test]
    fn test_shell_program() {
        let (program, flag) = shell_program();
        assert!(!program.is_empty());

        #[cfg(unix)]
        {
            assert_eq!(program, "/bin/sh");
            assert_eq!(flag, "-c");
        }

        #[cfg(windows)]
        assert_eq!(flag, "/C");
    }
}
