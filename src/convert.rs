//! Post-download conversion: segmented package → single media file.
//!
//! A "package" is the on-disk shape of a segment-based download: a directory
//! holding a local manifest plus the fetched segments. Conversion concatenates
//! the segments in manifest order into one file. Failures never touch the
//! original package; cleanup of the source directory only happens after the
//! output is fully written and renamed into place.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::ConversionError;

/// Name of the ordered segment list inside a package directory.
pub const PACKAGE_MANIFEST: &str = "manifest.txt";

/// Whether the path looks like a segmented package.
pub async fn is_package(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
        && fs::metadata(path.join(PACKAGE_MANIFEST))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
}

/// Checks the package shape and returns the segment paths in manifest order.
pub async fn verify_package(package: &Path) -> Result<Vec<PathBuf>, ConversionError> {
    if !is_package(package).await {
        return Err(ConversionError::UnsupportedFormat(format!(
            "{} is not a segmented package",
            package.display()
        )));
    }

    let manifest = fs::read_to_string(package.join(PACKAGE_MANIFEST)).await?;
    let mut segments = Vec::new();
    for name in manifest.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let segment = package.join(name);
        if !fs::metadata(&segment).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(ConversionError::MissingSegment(name.to_string()));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(ConversionError::UnsupportedFormat(format!(
            "{} has an empty manifest",
            package.display()
        )));
    }

    Ok(segments)
}

/// Concatenates the package's segments into `output`, reporting completion as
/// a `0.0..=1.0` fraction after each appended segment.
///
/// Writes go to a staging file next to `output`, renamed into place only once
/// every segment has been appended. Returns the output size in bytes.
pub async fn convert_package(
    package: &Path,
    output: &Path,
    mut on_progress: impl FnMut(f32) + Send,
) -> Result<u64, ConversionError> {
    let segments = verify_package(package).await?;
    let total = segments.len();

    let staging = staging_output(output);
    let result = concat_segments(&segments, &staging, total, &mut on_progress).await;

    match result {
        Ok(bytes) => {
            fs::rename(&staging, output).await?;
            debug!(
                package = %package.display(),
                output = %output.display(),
                segments = total,
                bytes,
                "package converted"
            );
            Ok(bytes)
        }
        Err(err) => {
            let _ = fs::remove_file(&staging).await;
            Err(err)
        }
    }
}

async fn concat_segments(
    segments: &[PathBuf],
    staging: &Path,
    total: usize,
    on_progress: &mut (impl FnMut(f32) + Send),
) -> Result<u64, ConversionError> {
    let mut out = fs::File::create(staging).await?;
    let mut written: u64 = 0;

    for (index, segment) in segments.iter().enumerate() {
        let bytes = fs::read(segment).await?;
        out.write_all(&bytes).await?;
        written += bytes.len() as u64;
        on_progress((index + 1) as f32 / total as f32);
    }

    out.flush().await?;
    Ok(written)
}

fn staging_output(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_package(segments: &[&[u8]]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vidarr-pkg-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).await.unwrap();

        let mut manifest = String::new();
        for (i, bytes) in segments.iter().enumerate() {
            let name = format!("seg-{:05}.ts", i + 1);
            fs::write(dir.join(&name), bytes).await.unwrap();
            manifest.push_str(&name);
            manifest.push('\n');
        }
        fs::write(dir.join(PACKAGE_MANIFEST), manifest).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn concatenates_segments_in_manifest_order() {
        let package = temp_package(&[b"alpha-", b"beta-", b"gamma"]).await;
        let output = package.with_extension("ts");

        let mut seen = Vec::new();
        let bytes = convert_package(&package, &output, |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(bytes, 16);
        let content = fs::read(&output).await.unwrap();
        assert_eq!(content, b"alpha-beta-gamma");

        // One progress report per segment, final one complete.
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen.last().unwrap() - 1.0).abs() < f32::EPSILON);

        fs::remove_dir_all(&package).await.unwrap();
        fs::remove_file(&output).await.unwrap();
    }

    #[tokio::test]
    async fn missing_segment_fails_without_touching_package() {
        let package = temp_package(&[b"alpha", b"beta"]).await;
        fs::remove_file(package.join("seg-00002.ts")).await.unwrap();
        let output = package.with_extension("ts");

        let err = convert_package(&package, &output, |_| {}).await.unwrap_err();
        assert!(matches!(err, ConversionError::MissingSegment(_)));

        // Original manifest and surviving segment untouched, no output created.
        assert!(is_package(&package).await);
        assert!(fs::metadata(package.join("seg-00001.ts")).await.is_ok());
        assert!(fs::metadata(&output).await.is_err());

        fs::remove_dir_all(&package).await.unwrap();
    }

    #[tokio::test]
    async fn plain_file_is_not_a_package() {
        let file = std::env::temp_dir().join(format!("vidarr-plain-{}.mp4", uuid::Uuid::new_v4()));
        fs::write(&file, b"not a package").await.unwrap();

        let err = verify_package(&file).await.unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));

        fs::remove_file(&file).await.unwrap();
    }

    #[tokio::test]
    async fn empty_manifest_is_unsupported() {
        let dir = std::env::temp_dir().join(format!("vidarr-pkg-empty-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join(PACKAGE_MANIFEST), "\n\n").await.unwrap();

        let err = verify_package(&dir).await.unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedFormat(_)));

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
