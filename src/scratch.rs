//! Scratch workspace: staging area for input copies and extractions.
//!
//! # Invariants
//! - The workspace lives at `<basedir>/goscan<random>/`.
//! - Teardown unmounts any ramdisk before removing the directory tree, and
//!   runs on every exit path (explicitly, or via `Drop` on unwind).
//! - Input files are reparented under their original directory structure,
//!   so every staged path is unique by construction.
//!
//! # Design Notes
//! - Ramdisk support is a backend capability: the pipeline only sees
//!   `setup`/`teardown`/`dir`. `PlainDirectory` is a no-op pair;
//!   `TmpfsLinux` and `HfsRamdiskDarwin` shell out to the platform tools.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use crate::error::Error;

/// Mount/unmount capability backing the scratch directory.
pub trait ScratchBackend: Send {
    /// Attach and mount over `dir`. Called once, right after the directory
    /// is created.
    fn mount(&mut self, dir: &Path) -> Result<(), Error>;
    /// Unmount whatever `mount` set up. Called before the tree is removed.
    fn unmount(&mut self, dir: &Path) -> Result<(), Error>;
}

/// Scratch on a plain directory; nothing to mount.
pub struct PlainDirectory;

impl ScratchBackend for PlainDirectory {
    fn mount(&mut self, _dir: &Path) -> Result<(), Error> {
        Ok(())
    }
    fn unmount(&mut self, _dir: &Path) -> Result<(), Error> {
        Ok(())
    }
}

/// tmpfs-backed scratch (Linux).
#[cfg(target_os = "linux")]
pub struct TmpfsLinux {
    size_mb: u64,
}

#[cfg(target_os = "linux")]
impl TmpfsLinux {
    pub fn new(size_mb: u64) -> Self {
        TmpfsLinux { size_mb }
    }
}

#[cfg(target_os = "linux")]
impl ScratchBackend for TmpfsLinux {
    fn mount(&mut self, dir: &Path) -> Result<(), Error> {
        run_tool(
            "mount",
            &[
                "-t".as_ref(),
                "tmpfs".as_ref(),
                "-o".as_ref(),
                format!("noatime,size={}m", self.size_mb).as_ref(),
                "tmpfs".as_ref(),
                dir.as_os_str(),
            ],
        )?;
        Ok(())
    }

    fn unmount(&mut self, dir: &Path) -> Result<(), Error> {
        run_tool("umount", &["-l".as_ref(), dir.as_os_str()])?;
        Ok(())
    }
}

/// HFS ramdisk-backed scratch (macOS).
#[cfg(target_os = "macos")]
pub struct HfsRamdiskDarwin {
    size_mb: u64,
    device: Option<String>,
}

#[cfg(target_os = "macos")]
impl HfsRamdiskDarwin {
    pub fn new(size_mb: u64) -> Self {
        HfsRamdiskDarwin {
            size_mb,
            device: None,
        }
    }
}

#[cfg(target_os = "macos")]
impl ScratchBackend for HfsRamdiskDarwin {
    fn mount(&mut self, dir: &Path) -> Result<(), Error> {
        // ram:// sizes are 512-byte sectors.
        let sectors = self.size_mb * 2048;
        let output = run_tool(
            "hdiutil",
            &[
                "attach".as_ref(),
                "-nomount".as_ref(),
                format!("ram://{sectors}").as_ref(),
            ],
        )?;
        let device = output.trim().to_string();
        let volname = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "goscan".to_string());
        run_tool("newfs_hfs", &["-v".as_ref(), volname.as_ref(), device.as_ref()])?;
        run_tool(
            "mount",
            &[
                "-o".as_ref(),
                "noatime".as_ref(),
                "-t".as_ref(),
                "hfs".as_ref(),
                device.as_ref(),
                dir.as_os_str(),
            ],
        )?;
        self.device = Some(device);
        Ok(())
    }

    fn unmount(&mut self, _dir: &Path) -> Result<(), Error> {
        if let Some(device) = self.device.take() {
            run_tool(
                "hdiutil",
                &["detach".as_ref(), device.as_ref(), "-force".as_ref()],
            )?;
        }
        Ok(())
    }
}

/// Run a mount-management tool, failing with its combined output.
#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
fn run_tool(tool: &str, args: &[&std::ffi::OsStr]) -> Result<String, Error> {
    let result = Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| Error::Ramdisk(format!("failed to run {tool}: {e}")))?;
    let mut combined = result.stdout.clone();
    combined.extend_from_slice(&result.stderr);
    let text = String::from_utf8_lossy(&combined).into_owned();
    if !result.status.success() {
        return Err(Error::Ramdisk(format!("{tool}: {}", text.trim())));
    }
    Ok(text)
}

/// The process-scoped scratch workspace.
pub struct Scratch {
    dir: Option<PathBuf>,
    backend: Box<dyn ScratchBackend>,
}

impl Scratch {
    /// Create `<basedir>/goscan<random>/` and mount the backend over it.
    pub fn new(basedir: &Path, mut backend: Box<dyn ScratchBackend>) -> Result<Scratch, Error> {
        let dir = tempfile::Builder::new()
            .prefix("goscan")
            .tempdir_in(basedir)
            .map_err(|e| {
                Error::Config(format!(
                    "cannot create scratch directory under {}: {e}",
                    basedir.display()
                ))
            })?
            .keep();
        if let Err(e) = backend.mount(&dir) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        tracing::debug!("scratch workspace at {}", dir.display());
        Ok(Scratch {
            dir: Some(dir),
            backend,
        })
    }

    /// The workspace root.
    pub fn dir(&self) -> &Path {
        self.dir.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Copy `input` into the workspace, reparented under its original
    /// directory structure (CWD-rooted for relative inputs). Colons in
    /// path components become underscores to stay portable.
    pub fn copy_file(&self, input: &Path) -> Result<PathBuf, Error> {
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        let absolute_parent = if parent.is_absolute() {
            parent.to_path_buf()
        } else {
            env::current_dir()?.join(parent)
        };

        let mut staged_dir = self.dir().to_path_buf();
        for component in absolute_parent.components() {
            match component {
                Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
                Component::ParentDir => {
                    staged_dir.pop();
                }
                Component::Normal(part) => {
                    staged_dir.push(part.to_string_lossy().replace(':', "_"));
                }
            }
        }
        fs::create_dir_all(&staged_dir)?;

        let file_name = input
            .file_name()
            .ok_or_else(|| Error::Config(format!("not a file path: {}", input.display())))?;
        let staged = staged_dir.join(file_name);
        fs::copy(input, &staged)?;
        Ok(staged)
    }

    /// Unmount and remove the workspace. Idempotent; an unmount failure
    /// aborts teardown so a mounted tree is never half-deleted.
    pub fn teardown(&mut self) -> Result<(), Error> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        if let Err(e) = self.backend.unmount(&dir) {
            // Restore so a retry (or Drop) can attempt again.
            self.dir = Some(dir);
            return Err(e);
        }
        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = self.backend.unmount(&dir);
            let _ = fs::remove_dir_all(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_scratch(base: &Path) -> Scratch {
        Scratch::new(base, Box::new(PlainDirectory)).unwrap()
    }

    #[test]
    fn creates_and_removes_prefixed_dir() {
        let base = tempfile::tempdir().unwrap();
        let mut scratch = plain_scratch(base.path());
        let dir = scratch.dir().to_path_buf();
        assert!(dir.is_dir());
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("goscan"));

        scratch.teardown().unwrap();
        assert!(!dir.exists());
        // Idempotent.
        scratch.teardown().unwrap();
    }

    #[test]
    fn drop_removes_workspace() {
        let base = tempfile::tempdir().unwrap();
        let dir;
        {
            let scratch = plain_scratch(base.path());
            dir = scratch.dir().to_path_buf();
            assert!(dir.is_dir());
        }
        assert!(!dir.exists());
    }

    #[test]
    fn copy_reparents_absolute_inputs() {
        let base = tempfile::tempdir().unwrap();
        let inputs = tempfile::tempdir().unwrap();
        let input = inputs.path().join("pkg.tar");
        fs::write(&input, b"payload").unwrap();

        let scratch = plain_scratch(base.path());
        let staged = scratch.copy_file(&input).unwrap();

        assert!(staged.starts_with(scratch.dir()));
        assert!(staged.ends_with(
            input
                .strip_prefix("/")
                .unwrap_or(&input)
        ));
        assert_eq!(fs::read(&staged).unwrap(), b"payload");
    }

    #[test]
    fn copy_rewrites_colons() {
        let base = tempfile::tempdir().unwrap();
        let inputs = tempfile::tempdir().unwrap();
        let odd_dir = inputs.path().join("release:2024");
        fs::create_dir(&odd_dir).unwrap();
        let input = odd_dir.join("data.bin");
        fs::write(&input, b"x").unwrap();

        let scratch = plain_scratch(base.path());
        let staged = scratch.copy_file(&input).unwrap();
        let staged_str = staged.to_string_lossy();
        assert!(staged_str.contains("release_2024"));
        assert!(!staged_str[scratch.dir().to_string_lossy().len()..].contains(':'));
    }

    #[test]
    fn copy_of_missing_input_fails() {
        let base = tempfile::tempdir().unwrap();
        let scratch = plain_scratch(base.path());
        assert!(scratch.copy_file(Path::new("/definitely/not/here")).is_err());
    }
}
