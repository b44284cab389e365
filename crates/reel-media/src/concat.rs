//! Final video assembly via the concat demuxer.

use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs::verify_non_empty;

/// Render a concat manifest line for one clip path.
///
/// Single quotes inside paths use the concat demuxer's `'\''` escape.
fn manifest_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Write a concat manifest listing each clip path in order.
pub async fn write_concat_manifest(
    clip_paths: &[impl AsRef<Path>],
    manifest_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let manifest_path = manifest_path.as_ref();

    let content = clip_paths
        .iter()
        .map(|p| manifest_line(p.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");

    fs::write(manifest_path, content).await?;
    Ok(())
}

/// Concatenate clips listed in a manifest into one output file.
///
/// The produced file is verified to be non-empty.
pub async fn concat_clips(
    manifest_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<u64> {
    let manifest_path = manifest_path.as_ref();
    let output_path = output_path.as_ref();

    if !manifest_path.exists() {
        return Err(MediaError::FileNotFound(manifest_path.to_path_buf()));
    }

    info!(
        manifest = %manifest_path.display(),
        output = %output_path.display(),
        "Concatenating scene clips"
    );

    let cmd = FfmpegCommand::new(output_path)
        .input_with_args(["-f", "concat", "-safe", "0"], manifest_path);

    FfmpegRunner::new().run(&cmd).await?;

    let size = verify_non_empty(output_path).await?;

    info!(
        output = %output_path.display(),
        size_bytes = size,
        "Final video created"
    );

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_line_escaping() {
        assert_eq!(
            manifest_line(Path::new("/tmp/scene_1.mp4")),
            "file '/tmp/scene_1.mp4'"
        );
        assert_eq!(
            manifest_line(Path::new("/tmp/it's.mp4")),
            "file '/tmp/it'\\''s.mp4'"
        );
    }

    #[tokio::test]
    async fn test_write_manifest_preserves_order() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("concat_list.txt");

        let clips = vec![
            PathBuf::from("/tmp/scene_1.mp4"),
            PathBuf::from("/tmp/scene_3.mp4"),
            PathBuf::from("/tmp/scene_4.mp4"),
        ];
        write_concat_manifest(&clips, &manifest).await.unwrap();

        let content = fs::read_to_string(&manifest).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "file '/tmp/scene_1.mp4'");
        assert_eq!(lines[1], "file '/tmp/scene_3.mp4'");
        assert_eq!(lines[2], "file '/tmp/scene_4.mp4'");
    }

    #[tokio::test]
    async fn test_concat_missing_manifest() {
        let err = concat_clips("/nonexistent/concat_list.txt", "/tmp/out.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
