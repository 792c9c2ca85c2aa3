//! # IO Utilities
//!
//! File system operations for the `.stataforge` runtime directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::catalog::Category;

/// Get the runtime directory path (.stataforge)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var("STATAFORGE_RUNTIME_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".stataforge")
}

/// Read a file from the runtime directory
pub async fn read_file(relative_path: impl AsRef<Path>) -> Result<String> {
    let path = get_runtime_path().join(relative_path.as_ref());
    fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))
}

/// Write a file to the runtime directory, returning its full path
pub async fn write_runtime_file(relative_path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
    let path = get_runtime_path().join(relative_path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(path)
}

/// Relative location of a category's exported do-file
pub fn export_path(category: Category) -> PathBuf {
    Path::new("exports").join(format!("{}.do", category.as_str()))
}

/// Write a rendered do-file to `exports/<category>.do`
pub async fn export_do_file(category: Category, content: &str) -> Result<PathBuf> {
    let path = write_runtime_file(export_path(category), content).await?;
    tracing::info!(category = %category, path = ?path, "Exported do-file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_path() {
        assert_eq!(
            export_path(Category::Robust),
            Path::new("exports").join("robust.do")
        );
    }

    #[tokio::test]
    async fn test_file_operations() {
        let relative = "test_io_file.txt";
        let content = "* Stata do-file\nsummarize";

        let written = write_runtime_file(relative, content).await.unwrap();
        assert!(written.ends_with(relative));

        let read_content = read_file(relative).await.unwrap();
        assert_eq!(read_content, content);

        let _ = fs::remove_file(written).await;
    }
}
