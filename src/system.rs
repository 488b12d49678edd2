//! Desktop integration helpers that shell out to the usual freedesktop
//! tools.

use anyhow::{Context as _, Result};
use log::debug;
use std::process::Command;

/// Well-known user directories, resolved through `xdg-user-dir`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemDir {
    Desktop,
    Dcim,
    Documents,
    Downloads,
    Movies,
    Music,
    Pictures,
    Ringtones,
}

impl SystemDir {
    fn xdg_user_dir_param(self) -> &'static str {
        match self {
            SystemDir::Desktop => "DESKTOP",
            SystemDir::Dcim => "PICTURES",
            SystemDir::Documents => "DOCUMENTS",
            SystemDir::Downloads => "DOWNLOAD",
            SystemDir::Movies => "VIDEOS",
            SystemDir::Music => "MUSIC",
            SystemDir::Pictures => "PICTURES",
            SystemDir::Ringtones => "MUSIC",
        }
    }
}

const URI_OPENERS: [&str; 3] = ["xdg-open", "gnome-open", "kde-open"];

/// Hands a uri to the desktop environment. Tries each known opener in turn
/// and succeeds on the first one that spawns.
pub fn shell_open(uri: &str) -> Result<()> {
    let mut last_error = None;
    for opener in URI_OPENERS {
        match Command::new(opener).arg(uri).spawn() {
            Ok(_) => {
                debug!("opened {uri:?} with {opener}");
                return Ok(());
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound)))
        .with_context(|| format!("failed to open {uri:?}"))
}

/// Path of a well-known user directory, falling back to the current
/// directory when `xdg-user-dir` is unavailable or reports nothing.
pub fn system_dir(dir: SystemDir) -> String {
    let output = Command::new("xdg-user-dir")
        .arg(dir.xdg_user_dir_param())
        .output();
    if let Ok(output) = output {
        if output.status.success() {
            if let Ok(path) = std::str::from_utf8(&output.stdout) {
                let path = path.trim();
                if !path.is_empty() {
                    return path.to_owned();
                }
            }
        }
    }
    debug!("xdg-user-dir gave no path for {dir:?}");
    String::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xdg_user_dir_params() {
        #[track_caller]
        fn check(dir: SystemDir, expected: &str) {
            assert_eq!(dir.xdg_user_dir_param(), expected);
        }

        check(SystemDir::Desktop, "DESKTOP");
        check(SystemDir::Dcim, "PICTURES");
        check(SystemDir::Documents, "DOCUMENTS");
        check(SystemDir::Downloads, "DOWNLOAD");
        check(SystemDir::Movies, "VIDEOS");
        check(SystemDir::Music, "MUSIC");
        check(SystemDir::Pictures, "PICTURES");
        check(SystemDir::Ringtones, "MUSIC");
    }
}
