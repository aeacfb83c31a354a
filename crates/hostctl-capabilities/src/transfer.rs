//! Capabilities that hand host files back to the caller.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use hostctl_core::{Capability, CapabilityArgs, CapabilityError, CapabilityOutput};
use serde_json::json;
use tokio::fs;

use crate::{
    command::{CommandBuilder, run_tool},
    fs::{display, path_arg, size_mb, timestamp},
    shell::expand_home,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    DownloadFile,
    DownloadDirectory,
    ListFilesInDirectory,
}

impl TransferOp {
    pub const ALL: [Self; 3] = [
        Self::DownloadFile,
        Self::DownloadDirectory,
        Self::ListFilesInDirectory,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DownloadFile => "download_file",
            Self::DownloadDirectory => "download_directory",
            Self::ListFilesInDirectory => "list_files_in_directory",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::DownloadFile => "Send a file to the caller as an attachment. Args: file_path.",
            Self::DownloadDirectory => {
                "Archive a directory as .tar.gz and send it. Args: directory_path, output (optional)."
            }
            Self::ListFilesInDirectory => {
                "List entries with type, size and modification time. Args: directory_path."
            }
        }
    }
}

/// File transfer capability; archives are written under `artifact_dir`.
#[derive(Debug, Clone)]
pub struct TransferCapability {
    op: TransferOp,
    artifact_dir: PathBuf,
}

impl TransferCapability {
    #[must_use]
    pub fn new(op: TransferOp, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            op,
            artifact_dir: artifact_dir.into(),
        }
    }

    #[must_use]
    pub fn all(artifact_dir: &Path) -> Vec<Arc<dyn Capability>> {
        TransferOp::ALL
            .into_iter()
            .map(|op| Arc::new(Self::new(op, artifact_dir)) as Arc<dyn Capability>)
            .collect()
    }
}

#[async_trait]
impl Capability for TransferCapability {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        match self.op {
            TransferOp::DownloadFile => download_file(&path_arg(args, "file_path")?).await,
            TransferOp::DownloadDirectory => {
                let archive = args.optional_path("output").map(|p| expand_home(&p));
                download_directory(&path_arg(args, "directory_path")?, archive, &self.artifact_dir)
                    .await
            }
            TransferOp::ListFilesInDirectory => {
                list_files_in_directory(&path_arg(args, "directory_path")?).await
            }
        }
    }
}

async fn download_file(file_path: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let meta = fs::metadata(file_path)
        .await
        .map_err(|_| CapabilityError::NotFound(file_path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(CapabilityError::InvalidArgument(format!(
            "{} is not a file",
            file_path.display()
        )));
    }
    let size = meta.len();
    Ok(
        CapabilityOutput::new(format!("File ready for download: {}", file_path.display()))
            .with("path", display(file_path))
            .with("size_bytes", size)
            .with("size_mb", size_mb(size))
            .with_file(file_path),
    )
}

async fn download_directory(
    directory: &Path,
    archive_path: Option<PathBuf>,
    artifact_dir: &Path,
) -> Result<CapabilityOutput, CapabilityError> {
    if !fs::metadata(directory).await.is_ok_and(|m| m.is_dir()) {
        return Err(CapabilityError::NotFound(directory.to_path_buf()));
    }

    let archive = match archive_path {
        Some(path) => path,
        None => {
            let stem = directory
                .file_name()
                .map_or_else(|| "archive".to_string(), |n| n.to_string_lossy().into_owned());
            artifact_dir.join(format!("{stem}.tar.gz"))
        }
    };
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(CapabilityError::io(format!(
            "Failed to create archive directory {}",
            parent.display()
        )))?;
    }

    run_tool(&CommandBuilder::new("tar").params([
        "-czf".to_string(),
        display(&archive),
        "-C".to_string(),
        display(directory),
        ".".to_string(),
    ]))
    .await?;

    let size = fs::metadata(&archive)
        .await
        .map_err(CapabilityError::io("Failed to stat archive"))?
        .len();
    tracing::info!(archive = %archive.display(), size, "Directory archived");

    Ok(CapabilityOutput::new(format!(
        "Directory compressed and ready for download: {}",
        archive.display()
    ))
    .with("directory", display(directory))
    .with("archive_path", display(&archive))
    .with("size_bytes", size)
    .with("size_mb", size_mb(size))
    .with_file(archive))
}

async fn list_files_in_directory(directory: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let context = format!("Failed to list files in {}", directory.display());
    let mut entries = fs::read_dir(directory)
        .await
        .map_err(CapabilityError::io(context.clone()))?;

    let mut rows = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(CapabilityError::io(context.clone()))?
    {
        let Ok(meta) = fs::metadata(entry.path()).await else {
            tracing::debug!(path = %entry.path().display(), "Skipping unreadable entry");
            continue;
        };
        rows.push((
            !meta.is_dir(),
            entry.file_name().to_string_lossy().into_owned(),
            meta,
        ));
    }
    // Directories first, then by name.
    rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let mut listing = Vec::with_capacity(rows.len());
    let mut lines = Vec::with_capacity(rows.len());
    for (is_file, name, meta) in rows {
        let kind = if is_file { "file" } else { "directory" };
        let size = if is_file { meta.len() } else { 0 };
        lines.push(if is_file {
            format!("📄 {name} ({size} bytes)")
        } else {
            format!("📁 {name}/")
        });
        listing.push(json!({
            "name": name,
            "type": kind,
            "size_bytes": size,
            "modified_time": timestamp(meta.modified()),
        }));
    }

    let mut message = format!("Found {} items in {}", listing.len(), directory.display());
    if !lines.is_empty() {
        message.push('\n');
        message.push_str(&lines.join("\n"));
    }

    Ok(CapabilityOutput::new(message)
        .with("directory", display(directory))
        .with("total_items", listing.len())
        .with("files", listing))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_download_file_marks_attachment() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.txt");
        std::fs::write(&file, "abc").unwrap();

        let out = TransferCapability::new(TransferOp::DownloadFile, dir.path())
            .invoke(&CapabilityArgs::new().with("file_path", file.display().to_string()))
            .await
            .unwrap();
        assert_eq!(out.file_path.as_deref(), Some(file.as_path()));
        assert_eq!(out.payload["size_bytes"], 3);
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = TransferCapability::new(TransferOp::DownloadFile, dir.path())
            .invoke(&CapabilityArgs::new().with("file_path", "/no/such/file.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_files_directories_first() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();

        let out = TransferCapability::new(TransferOp::ListFilesInDirectory, dir.path())
            .invoke(&CapabilityArgs::new().with("directory_path", dir.path().display().to_string()))
            .await
            .unwrap();
        assert_eq!(out.payload["total_items"], 2);
        assert_eq!(out.payload["files"][0]["name"], "zeta");
        assert_eq!(out.payload["files"][0]["type"], "directory");
        assert_eq!(out.payload["files"][1]["size_bytes"], 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_directory_writes_archive_in_artifact_dir() {
        if crate::shell::resolve_executable_path("tar").await.is_none() {
            return;
        }
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("one.txt"), "1").unwrap();
        let artifacts = TempDir::new().unwrap();

        let out = TransferCapability::new(TransferOp::DownloadDirectory, artifacts.path())
            .invoke(&CapabilityArgs::new().with("directory_path", src.path().display().to_string()))
            .await
            .unwrap();
        let archive = out.file_path.unwrap();
        assert!(archive.starts_with(artifacts.path()));
        assert!(archive.to_string_lossy().ends_with(".tar.gz"));
        assert!(archive.is_file());
    }
}
