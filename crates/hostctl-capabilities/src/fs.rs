//! Directory and file capabilities.
//!
//! Relative paths resolve against the process working directory, which
//! `chdir` changes for every caller at once.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use hostctl_core::{Capability, CapabilityArgs, CapabilityError, CapabilityOutput};
use serde_json::json;
use tokio::fs;

use crate::shell::expand_home;

/// Filesystem operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    GetCwd,
    Chdir,
    ListDirectory,
    CreateDirectory,
    DeleteDirectory,
    CreateFile,
    ReadFile,
    WriteFile,
    DeleteFile,
    CopyFile,
    MoveFile,
    FileExists,
    GetFileInfo,
    BatchRenameFiles,
    ChangeFilePermissions,
}

impl FsOp {
    pub const ALL: [Self; 15] = [
        Self::GetCwd,
        Self::Chdir,
        Self::ListDirectory,
        Self::CreateDirectory,
        Self::DeleteDirectory,
        Self::CreateFile,
        Self::ReadFile,
        Self::WriteFile,
        Self::DeleteFile,
        Self::CopyFile,
        Self::MoveFile,
        Self::FileExists,
        Self::GetFileInfo,
        Self::BatchRenameFiles,
        Self::ChangeFilePermissions,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetCwd => "get_cwd",
            Self::Chdir => "chdir",
            Self::ListDirectory => "list_directory",
            Self::CreateDirectory => "create_directory",
            Self::DeleteDirectory => "delete_directory",
            Self::CreateFile => "create_file",
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::DeleteFile => "delete_file",
            Self::CopyFile => "copy_file",
            Self::MoveFile => "move_file",
            Self::FileExists => "file_exists",
            Self::GetFileInfo => "get_file_info",
            Self::BatchRenameFiles => "batch_rename_files",
            Self::ChangeFilePermissions => "change_file_permissions",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::GetCwd => "Get the current working directory.",
            Self::Chdir => "Change the working directory. Args: directory.",
            Self::ListDirectory => "List folders and files. Args: directory (optional).",
            Self::CreateDirectory => "Create a directory and its parents. Args: dir_path.",
            Self::DeleteDirectory => "Delete a directory and everything in it. Args: dir_path.",
            Self::CreateFile => "Create a file, creating parents. Args: file_path, content (optional).",
            Self::ReadFile => "Read a UTF-8 text file. Args: file_path.",
            Self::WriteFile => "Overwrite a file. Args: file_path, content.",
            Self::DeleteFile => "Delete a file. Args: file_path.",
            Self::CopyFile => "Copy a file. Args: source, destination.",
            Self::MoveFile => "Move or rename a file. Args: source, destination.",
            Self::FileExists => "Check whether a path exists. Args: file_path.",
            Self::GetFileInfo => "Size and timestamps of a path. Args: file_path.",
            Self::BatchRenameFiles => {
                "Rename entries to {prefix}{index}{ext}. Args: directory, new_name_prefix, old_name (optional filter)."
            }
            Self::ChangeFilePermissions => "chmod with an octal mode. Args: file_path, mode.",
        }
    }
}

/// A filesystem capability.
#[derive(Debug, Clone, Copy)]
pub struct FsCapability {
    op: FsOp,
}

impl FsCapability {
    #[must_use]
    pub const fn new(op: FsOp) -> Self {
        Self { op }
    }

    /// One capability per filesystem operation.
    #[must_use]
    pub fn all() -> Vec<Arc<dyn Capability>> {
        FsOp::ALL
            .into_iter()
            .map(|op| Arc::new(Self::new(op)) as Arc<dyn Capability>)
            .collect()
    }
}

#[async_trait]
impl Capability for FsCapability {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        match self.op {
            FsOp::GetCwd => get_cwd(),
            FsOp::Chdir => chdir(&path_arg(args, "directory")?),
            FsOp::ListDirectory => list_directory(args.optional_path("directory")).await,
            FsOp::CreateDirectory => create_directory(&path_arg(args, "dir_path")?).await,
            FsOp::DeleteDirectory => delete_directory(&path_arg(args, "dir_path")?).await,
            FsOp::CreateFile => {
                let content = args.optional_str("content").unwrap_or_default();
                create_file(&path_arg(args, "file_path")?, content).await
            }
            FsOp::ReadFile => read_file(&path_arg(args, "file_path")?).await,
            FsOp::WriteFile => {
                let content = args.optional_str("content").unwrap_or_default();
                write_file(&path_arg(args, "file_path")?, content).await
            }
            FsOp::DeleteFile => delete_file(&path_arg(args, "file_path")?).await,
            FsOp::CopyFile => {
                copy_file(&path_arg(args, "source")?, &path_arg(args, "destination")?).await
            }
            FsOp::MoveFile => {
                move_file(&path_arg(args, "source")?, &path_arg(args, "destination")?).await
            }
            FsOp::FileExists => file_exists(&path_arg(args, "file_path")?).await,
            FsOp::GetFileInfo => get_file_info(&path_arg(args, "file_path")?).await,
            FsOp::BatchRenameFiles => {
                batch_rename_files(
                    &path_arg(args, "directory")?,
                    args.require_str("new_name_prefix")?,
                    args.optional_str("old_name"),
                )
                .await
            }
            FsOp::ChangeFilePermissions => {
                change_file_permissions(&path_arg(args, "file_path")?, &args.require_text("mode")?)
                    .await
            }
        }
    }
}

/// Required path argument with `~` expanded.
pub(crate) fn path_arg(args: &CapabilityArgs, key: &str) -> Result<PathBuf, CapabilityError> {
    args.require_path(key).map(|p| expand_home(&p))
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

pub(crate) fn timestamp(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok().map(|t| DateTime::<Local>::from(t).to_rfc3339())
}

fn current_dir() -> Result<PathBuf, CapabilityError> {
    std::env::current_dir().map_err(CapabilityError::io("Failed to get current directory"))
}

fn get_cwd() -> Result<CapabilityOutput, CapabilityError> {
    let cwd = display(&current_dir()?);
    Ok(CapabilityOutput::new(format!("Current directory: {cwd}")).with("cwd", cwd))
}

fn chdir(directory: &Path) -> Result<CapabilityOutput, CapabilityError> {
    std::env::set_current_dir(directory).map_err(CapabilityError::io(format!(
        "Failed to change directory to {}",
        directory.display()
    )))?;
    let cwd = display(&current_dir()?);
    tracing::info!(cwd = %cwd, "Working directory changed");
    Ok(CapabilityOutput::new(format!("Changed directory to: {cwd}")).with("cwd", cwd))
}

async fn list_directory(directory: Option<PathBuf>) -> Result<CapabilityOutput, CapabilityError> {
    let path = match directory {
        Some(dir) => expand_home(&dir),
        None => current_dir()?,
    };
    let context = format!("Failed to list directory {}", path.display());

    let mut folders = Vec::new();
    let mut files = Vec::new();
    let mut entries = fs::read_dir(&path)
        .await
        .map_err(CapabilityError::io(context.clone()))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(CapabilityError::io(context.clone()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Follow symlinks so a link to a directory lists as a folder.
        if fs::metadata(entry.path()).await.is_ok_and(|m| m.is_dir()) {
            folders.push(name);
        } else {
            files.push(name);
        }
    }
    folders.sort();
    files.sort();

    let mut message = format!(
        "Found {} folders and {} files in {}",
        folders.len(),
        files.len(),
        path.display()
    );
    if !folders.is_empty() {
        message.push_str(&format!("\nFolders: {}", folders.join(", ")));
    }
    if !files.is_empty() {
        message.push_str(&format!("\nFiles: {}", files.join(", ")));
    }

    Ok(CapabilityOutput::new(message)
        .with("path", display(&path))
        .with("folders", folders)
        .with("files", files))
}

async fn create_directory(dir_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    fs::create_dir_all(dir_path).await.map_err(CapabilityError::io(format!(
        "Failed to create directory {}",
        dir_path.display()
    )))?;
    Ok(
        CapabilityOutput::new(format!("Successfully created directory: {}", dir_path.display()))
            .with("path", display(dir_path)),
    )
}

async fn delete_directory(dir_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    fs::remove_dir_all(dir_path).await.map_err(CapabilityError::io(format!(
        "Failed to delete directory {}",
        dir_path.display()
    )))?;
    Ok(
        CapabilityOutput::new(format!("Successfully deleted directory: {}", dir_path.display()))
            .with("path", display(dir_path)),
    )
}

async fn create_file(file_path: &Path, content: &str) -> Result<CapabilityOutput, CapabilityError> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(CapabilityError::io(format!(
            "Failed to create parent directory {}",
            parent.display()
        )))?;
    }
    fs::write(file_path, content).await.map_err(CapabilityError::io(format!(
        "Failed to create file {}",
        file_path.display()
    )))?;
    Ok(
        CapabilityOutput::new(format!("Successfully created file: {}", file_path.display()))
            .with("path", display(file_path))
            .with("size_bytes", content.len()),
    )
}

async fn read_file(file_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let content = fs::read_to_string(file_path).await.map_err(CapabilityError::io(format!(
        "Failed to read file {}",
        file_path.display()
    )))?;
    let message = format!("Successfully read file: {}\n\n{content}", file_path.display());
    Ok(CapabilityOutput::new(message)
        .with("path", display(file_path))
        .with("content", content))
}

async fn write_file(file_path: &Path, content: &str) -> Result<CapabilityOutput, CapabilityError> {
    fs::write(file_path, content).await.map_err(CapabilityError::io(format!(
        "Failed to write to file {}",
        file_path.display()
    )))?;
    Ok(
        CapabilityOutput::new(format!("Successfully wrote to file: {}", file_path.display()))
            .with("path", display(file_path))
            .with("size_bytes", content.len()),
    )
}

async fn delete_file(file_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    fs::remove_file(file_path).await.map_err(CapabilityError::io(format!(
        "Failed to delete file {}",
        file_path.display()
    )))?;
    Ok(
        CapabilityOutput::new(format!("Successfully deleted file: {}", file_path.display()))
            .with("path", display(file_path)),
    )
}

/// A destination that is an existing directory receives the source's file name.
async fn resolve_destination(source: &Path, destination: &Path) -> PathBuf {
    let is_dir = fs::metadata(destination).await.is_ok_and(|m| m.is_dir());
    match source.file_name() {
        Some(name) if is_dir => destination.join(name),
        _ => destination.to_path_buf(),
    }
}

async fn copy_file(source: &Path, destination: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let target = resolve_destination(source, destination).await;
    let bytes = fs::copy(source, &target).await.map_err(CapabilityError::io(format!(
        "Failed to copy {} to {}",
        source.display(),
        target.display()
    )))?;
    Ok(CapabilityOutput::new(format!(
        "Successfully copied {} to {}",
        source.display(),
        target.display()
    ))
    .with("source", display(source))
    .with("destination", display(&target))
    .with("size_bytes", bytes))
}

async fn move_file(source: &Path, destination: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let target = resolve_destination(source, destination).await;
    let context = format!("Failed to move {} to {}", source.display(), target.display());

    if let Err(rename_err) = fs::rename(source, &target).await {
        // rename cannot cross filesystems; fall back to copy + delete for files.
        if !fs::metadata(source).await.is_ok_and(|m| m.is_file()) {
            return Err(CapabilityError::io(context)(rename_err));
        }
        tracing::debug!(error = %rename_err, "rename failed, copying instead");
        fs::copy(source, &target)
            .await
            .map_err(CapabilityError::io(context.clone()))?;
        fs::remove_file(source)
            .await
            .map_err(CapabilityError::io(context))?;
    }

    Ok(CapabilityOutput::new(format!(
        "Successfully moved {} to {}",
        source.display(),
        target.display()
    ))
    .with("source", display(source))
    .with("destination", display(&target)))
}

async fn file_exists(file_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let exists = fs::try_exists(file_path).await.map_err(CapabilityError::io(format!(
        "Failed to check path existence {}",
        file_path.display()
    )))?;
    let verb = if exists { "exists" } else { "does not exist" };
    Ok(
        CapabilityOutput::new(format!("Path {verb}: {}", file_path.display()))
            .with("path", display(file_path))
            .with("exists", exists),
    )
}

async fn get_file_info(file_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let meta = fs::metadata(file_path).await.map_err(CapabilityError::io(format!(
        "Failed to get file info for {}",
        file_path.display()
    )))?;
    let size = meta.len();
    Ok(
        CapabilityOutput::new(format!("File info retrieved for: {}", file_path.display()))
            .with("path", display(file_path))
            .with("size_bytes", size)
            .with("size_mb", size_mb(size))
            .with("modified_time", timestamp(meta.modified()))
            .with("created_time", timestamp(meta.created()))
            .with("is_file", meta.is_file())
            .with("is_directory", meta.is_dir()),
    )
}

async fn batch_rename_files(
    directory: &Path,
    prefix: &str,
    filter: Option<&str>,
) -> Result<CapabilityOutput, CapabilityError> {
    let context = format!("Failed to batch rename files in {}", directory.display());
    let mut names = Vec::new();
    let mut entries = fs::read_dir(directory)
        .await
        .map_err(CapabilityError::io(context.clone()))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(CapabilityError::io(context.clone()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if filter.is_none_or(|f| name.contains(f)) {
            names.push((name, entry.path()));
        }
    }
    names.sort();

    let mut plan = Vec::with_capacity(names.len());
    for (index, (name, path)) in names.iter().enumerate() {
        let is_dir = fs::metadata(path).await.is_ok_and(|m| m.is_dir());
        let ext = if is_dir {
            String::new()
        } else {
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default()
        };
        plan.push((name.as_str(), format!("{prefix}{index}{ext}")));
    }

    // A target may only already exist if it is itself one of the renamed entries.
    let sources: HashSet<&str> = names.iter().map(|(name, _)| name.as_str()).collect();
    let clashes: Vec<&str> = plan
        .iter()
        .map(|(_, target)| target.as_str())
        .filter(|target| !sources.contains(target) && directory.join(target).exists())
        .collect();
    let staged: Vec<String> = (0..plan.len())
        .map(|index| format!(".hostctl-rename-{}-{index}", std::process::id()))
        .collect();
    let clashes: Vec<&str> = clashes
        .into_iter()
        .chain(staged.iter().map(String::as_str).filter(|stage| directory.join(stage).exists()))
        .collect();
    if !clashes.is_empty() {
        return Err(CapabilityError::InvalidArgument(format!(
            "rename targets already exist: {}",
            clashes.join(", ")
        )));
    }

    // Two passes through staging names so targets that are also sources are
    // never overwritten.
    for (done, ((name, _), stage)) in plan.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::rename(directory.join(name), directory.join(stage)).await {
            restore(directory, plan.iter().map(|(name, _)| *name).zip(&staged).take(done)).await;
            return Err(CapabilityError::io(format!("Failed to rename {name}"))(e));
        }
    }

    let mut renamed = Vec::new();
    for (done, ((name, target), stage)) in plan.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::rename(directory.join(stage), directory.join(target)).await {
            restore(directory, plan.iter().map(|(name, _)| *name).zip(&staged).skip(done)).await;
            return Err(CapabilityError::Io {
                context: format!(
                    "Failed to rename {name} after renaming {done} items ({})",
                    renamed_summary(&plan[..done])
                ),
                source: e,
            });
        }
        renamed.push(json!({ "from": name, "to": target }));
    }

    Ok(CapabilityOutput::new(format!(
        "Successfully renamed {} items in {}",
        renamed.len(),
        directory.display()
    ))
    .with("directory", display(directory))
    .with("renamed_count", renamed.len())
    .with("renamed", renamed))
}

/// Move staged entries back to their original names, unless that name was
/// taken in the meantime.
async fn restore<'a>(directory: &Path, staged: impl Iterator<Item = (&'a str, &'a String)>) {
    for (name, stage) in staged {
        if directory.join(name).exists() {
            tracing::error!(name, stage = %stage, "Original name taken, entry left under staging name");
            continue;
        }
        if let Err(e) = fs::rename(directory.join(stage), directory.join(name)).await {
            tracing::error!(name, stage = %stage, error = %e, "Failed to restore entry after rename failure");
        }
    }
}

fn renamed_summary(done: &[(&str, String)]) -> String {
    done.iter()
        .map(|(from, to)| format!("{from} -> {to}"))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn change_file_permissions(
    file_path: &Path,
    mode: &str,
) -> Result<CapabilityOutput, CapabilityError> {
    let bits = u32::from_str_radix(mode.trim().trim_start_matches("0o"), 8).map_err(|_| {
        CapabilityError::InvalidArgument(format!("mode must be octal (e.g. 755), got {mode}"))
    })?;
    let context = format!("Failed to change permissions of {}", file_path.display());

    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        std::fs::Permissions::from_mode(bits)
    };
    #[cfg(not(unix))]
    let permissions = {
        let mut permissions = fs::metadata(file_path)
            .await
            .map_err(CapabilityError::io(context.clone()))?
            .permissions();
        permissions.set_readonly(bits & 0o222 == 0);
        permissions
    };

    fs::set_permissions(file_path, permissions)
        .await
        .map_err(CapabilityError::io(context))?;
    Ok(CapabilityOutput::new(format!(
        "Successfully changed permissions of {} to {mode}",
        file_path.display()
    ))
    .with("path", display(file_path))
    .with("mode", format!("{bits:o}")))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn run(op: FsOp, args: CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        FsCapability::new(op).invoke(&args).await
    }

    fn path_str(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    #[tokio::test]
    async fn test_create_read_write_delete_file() {
        let dir = TempDir::new().unwrap();
        let file = path_str(&dir, "nested/notes.txt");

        let out = run(
            FsOp::CreateFile,
            CapabilityArgs::new().with("file_path", file.as_str()).with("content", "hello"),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["size_bytes"], 5);

        run(
            FsOp::WriteFile,
            CapabilityArgs::new().with("file_path", file.as_str()).with("content", "world"),
        )
        .await
        .unwrap();

        let out = run(FsOp::ReadFile, CapabilityArgs::new().with("file_path", file.as_str()))
            .await
            .unwrap();
        assert_eq!(out.payload["content"], "world");
        assert!(out.message.ends_with("world"));

        run(FsOp::DeleteFile, CapabilityArgs::new().with("file_path", file.as_str()))
            .await
            .unwrap();
        assert!(!dir.path().join("nested/notes.txt").exists());
    }

    #[tokio::test]
    async fn test_create_file_without_content_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = path_str(&dir, "empty.txt");
        run(
            FsOp::CreateFile,
            CapabilityArgs::new().with("file_path", file.as_str()).with("content", serde_json::Value::Null),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "");
    }

    #[tokio::test]
    async fn test_read_missing_file_embeds_platform_error() {
        let dir = TempDir::new().unwrap();
        let err = run(
            FsOp::ReadFile,
            CapabilityArgs::new().with("file_path", path_str(&dir, "nope.txt")),
        )
        .await
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to read file"));
        assert!(msg.contains("nope.txt"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let err = run(FsOp::ReadFile, CapabilityArgs::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_list_directory_splits_folders_and_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let out = run(
            FsOp::ListDirectory,
            CapabilityArgs::new().with("directory", dir.path().display().to_string()),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["folders"], json!(["sub"]));
        assert_eq!(out.payload["files"], json!(["a.txt", "b.txt"]));
        assert!(out.message.starts_with("Found 1 folders and 2 files"));
    }

    #[tokio::test]
    async fn test_copy_into_directory_and_move() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("src.txt"), "data").unwrap();
        std::fs::create_dir(dir.path().join("backup")).unwrap();

        let out = run(
            FsOp::CopyFile,
            CapabilityArgs::new()
                .with("source", path_str(&dir, "src.txt"))
                .with("destination", path_str(&dir, "backup")),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["destination"], path_str(&dir, "backup/src.txt"));
        assert!(dir.path().join("backup/src.txt").is_file());

        run(
            FsOp::MoveFile,
            CapabilityArgs::new()
                .with("source", path_str(&dir, "src.txt"))
                .with("destination", path_str(&dir, "renamed.txt")),
        )
        .await
        .unwrap();
        assert!(!dir.path().join("src.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("renamed.txt")).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_file_exists_and_info() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.bin"), vec![0u8; 2048]).unwrap();

        let out = run(
            FsOp::FileExists,
            CapabilityArgs::new().with("file_path", path_str(&dir, "missing")),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["exists"], false);

        let out = run(
            FsOp::GetFileInfo,
            CapabilityArgs::new().with("file_path", path_str(&dir, "f.bin")),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["size_bytes"], 2048);
        assert_eq!(out.payload["is_file"], true);
        assert_eq!(out.payload["is_directory"], false);
    }

    #[tokio::test]
    async fn test_create_and_delete_directory() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "a/b/c");
        run(FsOp::CreateDirectory, CapabilityArgs::new().with("dir_path", target.as_str()))
            .await
            .unwrap();
        assert!(dir.path().join("a/b/c").is_dir());

        run(FsOp::DeleteDirectory, CapabilityArgs::new().with("dir_path", path_str(&dir, "a")))
            .await
            .unwrap();
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_batch_rename_sorted_with_filter() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("img_b.png"), "").unwrap();
        std::fs::write(dir.path().join("img_a.png"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let out = run(
            FsOp::BatchRenameFiles,
            CapabilityArgs::new()
                .with("directory", dir.path().display().to_string())
                .with("new_name_prefix", "photo_")
                .with("old_name", "img_"),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["renamed_count"], 2);
        assert!(dir.path().join("photo_0.png").is_file());
        assert!(dir.path().join("photo_1.png").is_file());
        assert!(dir.path().join("notes.txt").is_file());
    }

    #[tokio::test]
    async fn test_batch_rename_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("f0.txt"), "keep").unwrap();

        let err = run(
            FsOp::BatchRenameFiles,
            CapabilityArgs::new()
                .with("directory", dir.path().display().to_string())
                .with("new_name_prefix", "f")
                .with("old_name", "b"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArgument(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("f0.txt")).unwrap(), "keep");
        assert!(dir.path().join("b.txt").is_file());
    }

    #[tokio::test]
    async fn test_batch_rename_swaps_through_targets_that_are_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("f0.txt"), "f0").unwrap();

        let out = run(
            FsOp::BatchRenameFiles,
            CapabilityArgs::new()
                .with("directory", dir.path().display().to_string())
                .with("new_name_prefix", "f"),
        )
        .await
        .unwrap();
        assert_eq!(out.payload["renamed_count"], 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("f0.txt")).unwrap(), "b");
        assert_eq!(std::fs::read_to_string(dir.path().join("f1.txt")).unwrap(), "f0");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chmod_accepts_numeric_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("run.sh"), "").unwrap();
        run(
            FsOp::ChangeFilePermissions,
            CapabilityArgs::new()
                .with("file_path", path_str(&dir, "run.sh"))
                .with("mode", 755),
        )
        .await
        .unwrap();
        let mode = std::fs::metadata(dir.path().join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_invalid_mode_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.sh"), "").unwrap();
        let err = run(
            FsOp::ChangeFilePermissions,
            CapabilityArgs::new()
                .with("file_path", path_str(&dir, "x.sh"))
                .with("mode", "rwx"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArgument(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chmod_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.sh"), "").unwrap();
        run(
            FsOp::ChangeFilePermissions,
            CapabilityArgs::new()
                .with("file_path", path_str(&dir, "x.sh"))
                .with("mode", "750"),
        )
        .await
        .unwrap();
        let mode = std::fs::metadata(dir.path().join("x.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_size_mb_rounds() {
        assert!((size_mb(1024 * 1024) - 1.0).abs() < f64::EPSILON);
        assert!((size_mb(1_572_864) - 1.5).abs() < f64::EPSILON);
    }
}
