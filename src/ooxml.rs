//! # OOXML Media Repacking Module
//!
//! Office Open XML documents (`.docx`, `.xlsx`, `.pptx`) are ZIP containers
//! with embedded media under a per-format directory. The repacker extracts
//! the container, recompresses PNG and JPEG media in place with the external
//! optimizers and packs the tree again through [`ArchiveRepacker::pack_dir`].
//!
//! Media optimization is best effort: a missing optimizer or a failed run
//! leaves the original bytes of that media file untouched.

use crate::archive::{extract_zip, ArchiveRepacker, ScratchDir};
use crate::classifier::lowercase_extension;
use crate::config::Config;
use crate::image_processor::{ImageProcessor, ToolOutcome};
use crate::tool_resolver::ToolTable;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The three OOXML container flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OoxmlKind {
    Word,
    Excel,
    PowerPoint,
}

impl OoxmlKind {
    /// Media directory inside the container
    pub fn media_dir(&self) -> &'static str {
        match self {
            OoxmlKind::Word => "word/media",
            OoxmlKind::Excel => "xl/media",
            OoxmlKind::PowerPoint => "ppt/media",
        }
    }
}

/// Counts reported after recompressing a media directory
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaReport {
    pub seen: usize,
    pub improved: usize,
    pub bytes_saved: u64,
}

pub struct OoxmlRepacker<'a> {
    tools: &'a ToolTable,
    config: &'a Config,
}

impl<'a> OoxmlRepacker<'a> {
    pub fn new(tools: &'a ToolTable, config: &'a Config) -> Self {
        Self { tools, config }
    }

    /// Repack the document at `source` into `dest`
    pub async fn repack(&self, source: &Path, dest: &Path, kind: OoxmlKind) -> Result<MediaReport> {
        let scratch = ScratchDir::new()?;
        let (archive, target) = (source.to_path_buf(), scratch.path().to_path_buf());
        tokio::task::spawn_blocking(move || extract_zip(&archive, &target)).await??;

        let media_dir = scratch.path().join(kind.media_dir());
        let report = self.recompress_media(&media_dir).await?;
        debug!(
            "{}: {} media files, {} improved, {} bytes saved",
            source.display(),
            report.seen,
            report.improved,
            report.bytes_saved
        );

        ArchiveRepacker::new(self.tools).pack_dir(scratch.path(), dest).await?;
        scratch.close()?;
        Ok(report)
    }

    /// Recompress every PNG/JPEG below `media_dir` in place
    pub async fn recompress_media(&self, media_dir: &Path) -> Result<MediaReport> {
        let mut report = MediaReport::default();
        if !media_dir.is_dir() {
            return Ok(report);
        }

        let processor = ImageProcessor::new(self.tools, self.config);
        for path in media_files(media_dir) {
            report.seen += 1;
            match self.recompress_one(&processor, &path).await {
                Ok(Some(saved)) => {
                    report.improved += 1;
                    report.bytes_saved += saved;
                }
                Ok(None) => {}
                Err(e) => warn!("Keeping original media {}: {:#}", path.display(), e),
            }
        }

        Ok(report)
    }

    async fn recompress_one(&self, processor: &ImageProcessor<'_>, path: &Path) -> Result<Option<u64>> {
        let Some(ext) = lowercase_extension(path) else {
            return Ok(None);
        };

        let candidate = candidate_path(path);
        let outcome = match ext.as_str() {
            "png" => processor.optimize_png(path, &candidate).await?,
            "jpg" | "jpeg" => processor.optimize_jpeg(path, &candidate, &self.config.jpeg_markers).await?,
            _ => return Ok(None),
        };

        match outcome {
            ToolOutcome::Improved(new_size) => {
                let old_size = tokio::fs::metadata(path).await?.len();
                tokio::fs::rename(&candidate, path).await?;
                Ok(Some(old_size.saturating_sub(new_size)))
            }
            ToolOutcome::NoChange | ToolOutcome::Unavailable => {
                if tokio::fs::try_exists(&candidate).await? {
                    tokio::fs::remove_file(&candidate).await?;
                }
                Ok(None)
            }
        }
    }
}

fn media_files(media_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(media_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            matches!(lowercase_extension(path).as_deref(), Some("png") | Some("jpg") | Some("jpeg"))
        })
        .collect()
}

/// Sibling path the optimizer writes to before replacing the media file
fn candidate_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".rypak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipArchive, ZipWriter};

    fn write_docx(path: &Path) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let files: [(&str, &[u8]); 4] = [
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", b"<w:document><w:body/></w:document>"),
            ("word/media/image1.PNG", b"fake png bytes"),
            ("word/media/photo.jpeg", b"fake jpeg bytes"),
        ];
        for (name, data) in files {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn contents(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries: Vec<_> = (0..archive.len())
            .filter_map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                if entry.is_dir() {
                    return None;
                }
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                Some((entry.name().to_string(), data))
            })
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_media_dirs() {
        assert_eq!(OoxmlKind::Word.media_dir(), "word/media");
        assert_eq!(OoxmlKind::Excel.media_dir(), "xl/media");
        assert_eq!(OoxmlKind::PowerPoint.media_dir(), "ppt/media");
    }

    #[test]
    fn test_media_files_matches_case_insensitively() {
        let dir = TempDir::new().unwrap();
        for name in ["a.PNG", "b.Jpg", "c.jpeg", "d.emf", "e.xml"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<_> = media_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.Jpg", "c.jpeg"]);
    }

    #[tokio::test]
    async fn test_repack_without_optimizers_keeps_media() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.docx");
        let dest = dir.path().join("report.new.docx");
        write_docx(&source);

        let tools = ToolTable::empty();
        let config = Config::default();
        let report = OoxmlRepacker::new(&tools, &config)
            .repack(&source, &dest, OoxmlKind::Word)
            .await
            .unwrap();

        assert_eq!(report.seen, 2);
        assert_eq!(report.improved, 0);
        assert_eq!(contents(&source), contents(&dest));
    }

    #[tokio::test]
    async fn test_missing_media_dir_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let tools = ToolTable::empty();
        let config = Config::default();
        let report = OoxmlRepacker::new(&tools, &config)
            .recompress_media(&dir.path().join("ppt/media"))
            .await
            .unwrap();
        assert_eq!(report, MediaReport::default());
    }
}
