//! # TAR to ZIP Conversion Module
//!
//! Questo modulo converte un archivio TAR in un archivio ZIP equivalente.
//!
//! ## Responsabilità:
//! - Legge ogni membro del TAR con il crate `tar`
//! - Scrive file regolari e directory in un nuovo ZIP con Deflate
//! - Converte l'mtime (secondi epoch) nella tupla locale ZIP
//!   (anno, mese, giorno, ora, minuto, secondo), senza frazioni di secondo
//! - Copia timestamp e permessi del TAR sul file ZIP prodotto
//!
//! ## Note:
//! - Il TAR sorgente non viene mai cancellato
//! - Output di default: stesso path con estensione `.zip`
//! - Hard link copiati dai byte del membro collegato, symlink scritti come
//!   entry symlink ZIP; device e altri membri speciali vengono saltati
//! - Lo ZIP viene scritto in un file temporaneo accanto e spostato solo a
//!   conversione completata, senza mai sovrascrivere un file esistente

use crate::archive::zip_datetime_from_epoch;
use crate::error::OptimizeError;
use crate::file_manager::FileManager;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Outcome of one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarConversion {
    pub zip_path: PathBuf,
    pub entries: usize,
}

pub struct TarConverter;

impl TarConverter {
    /// Default output path: the TAR path with a `.zip` extension
    pub fn zip_path_for(tar_path: &Path) -> PathBuf {
        tar_path.with_extension("zip")
    }

    /// Convert `tar_path` into a ZIP at `zip_path` (or the default path).
    ///
    /// The archive is written to a temporary sibling and moved into place only
    /// when complete; an existing file at the output path is never replaced.
    pub async fn convert(tar_path: &Path, zip_path: Option<&Path>) -> Result<TarConversion> {
        let zip_path = zip_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::zip_path_for(tar_path));
        let out_dir = match zip_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let source = tar_path.to_path_buf();
        let (partial, entries) = tokio::task::spawn_blocking(move || -> Result<(NamedTempFile, usize)> {
            let mut partial = tempfile::Builder::new()
                .prefix(".rypak-")
                .suffix(".zip")
                .tempfile_in(&out_dir)
                .with_context(|| format!("Failed to create temporary ZIP in {}", out_dir.display()))?;
            let entries = write_zip_from_tar(&source, partial.as_file_mut())?;
            Ok((partial, entries))
        })
        .await??;

        partial
            .persist_noclobber(&zip_path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to create {}", zip_path.display()))?;

        FileManager::copy_metadata(tar_path, &zip_path).await?;
        debug!("Converted {} ({} entries) into {}", tar_path.display(), entries, zip_path.display());

        Ok(TarConversion { zip_path, entries })
    }
}

fn write_zip_from_tar<W: Read + Write + Seek>(tar_path: &Path, output: W) -> Result<usize> {
    let input = File::open(tar_path)
        .with_context(|| format!("Failed to open TAR archive {}", tar_path.display()))?;
    let mut archive = Archive::new(input);
    let mut writer = ZipWriter::new(output);
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(name) = zip_entry_name(&path) else {
            if path.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir)) {
                warn!("Skipping unsafe member {:?} in {}", path, tar_path.display());
            }
            continue;
        };

        let header = entry.header();
        let mtime = header.mtime()?;
        let secs = i64::try_from(mtime)
            .map_err(|_| OptimizeError::Timestamp(format!("{} has mtime {} out of range", name, mtime)))?;

        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip_datetime_from_epoch(secs));
        if let Ok(mode) = header.mode() {
            options = options.unix_permissions(mode);
        }

        match header.entry_type() {
            EntryType::Directory => {
                writer
                    .add_directory(format!("{}/", name), options)
                    .map_err(OptimizeError::from)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                let size = header.size()?;
                writer
                    .start_file(name.clone(), options.large_file(size >= u64::from(u32::MAX)))
                    .map_err(OptimizeError::from)?;
                io::copy(&mut entry, &mut writer)
                    .with_context(|| format!("Failed to copy member {} of {}", name, tar_path.display()))?;
            }
            EntryType::Link => {
                // hard link: same bytes as a member written earlier
                let target = entry.link_name()?.and_then(|target| zip_entry_name(&target));
                let copied = match target {
                    Some(ref target) => writer.deep_copy_file(target, &name).is_ok(),
                    None => false,
                };
                if !copied {
                    warn!("Skipping hard link {} with unresolved target in {}", name, tar_path.display());
                    continue;
                }
            }
            EntryType::Symlink => {
                let Some(target) = entry.link_name()? else {
                    warn!("Skipping symlink {} without target in {}", name, tar_path.display());
                    continue;
                };
                writer
                    .add_symlink(name.clone(), target.to_string_lossy(), options)
                    .map_err(OptimizeError::from)?;
            }
            other => {
                debug!("Skipping {:?} member {}", other, name);
                continue;
            }
        }
        written += 1;
    }

    writer.finish().map_err(OptimizeError::from)?;
    Ok(written)
}

/// ZIP entry name for a TAR member path, `None` for the root or unsafe paths
fn zip_entry_name(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn append(builder: &mut tar::Builder<File>, name: &str, data: &[u8], mtime: u64, kind: EntryType) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(kind);
        header.set_size(data.len() as u64);
        header.set_mode(if kind == EntryType::Directory { 0o755 } else { 0o640 });
        header.set_mtime(mtime);
        builder.append_data(&mut header, name, data).unwrap();
    }

    #[test]
    fn test_zip_entry_names() {
        assert_eq!(zip_entry_name(Path::new("./a/b.txt")).as_deref(), Some("a/b.txt"));
        assert_eq!(zip_entry_name(Path::new("./")), None);
        assert_eq!(zip_entry_name(Path::new("../etc/passwd")), None);
    }

    #[test]
    fn test_default_zip_path() {
        assert_eq!(TarConverter::zip_path_for(Path::new("/d/backup.tar")), PathBuf::from("/d/backup.zip"));
    }

    #[tokio::test]
    async fn test_convert_keeps_names_contents_and_times() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("bundle.tar");
        {
            let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
            append(&mut builder, "docs", b"", 1_500_000_000, EntryType::Directory);
            append(&mut builder, "docs/readme.txt", b"read me", 1_500_000_002, EntryType::Regular);
            append(&mut builder, "data.bin", &[7u8; 2048], 1_600_000_000, EntryType::Regular);
            builder.finish().unwrap();
        }

        let conversion = TarConverter::convert(&tar_path, None).await.unwrap();
        assert_eq!(conversion.zip_path, dir.path().join("bundle.zip"));
        assert_eq!(conversion.entries, 3);
        assert!(tar_path.exists());

        let mut archive = ZipArchive::new(File::open(&conversion.zip_path).unwrap()).unwrap();
        let expected: [(&str, &[u8], i64); 2] = [
            ("docs/readme.txt", b"read me", 1_500_000_002),
            ("data.bin", &[7u8; 2048], 1_600_000_000),
        ];
        for (name, data, mtime) in expected {
            let mut entry = archive.by_name(name).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            assert_eq!(content, data);
            assert_eq!(entry.last_modified(), Some(zip_datetime_from_epoch(mtime)));
        }
        assert!(archive.by_name("docs/").unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_convert_copies_file_timestamps() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("t.tar");
        {
            let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
            append(&mut builder, "a.txt", b"a", 1_600_000_000, EntryType::Regular);
            builder.finish().unwrap();
        }
        let stamp = UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        File::options().write(true).open(&tar_path).unwrap().set_modified(stamp).unwrap();

        let out = dir.path().join("custom.zip");
        let conversion = TarConverter::convert(&tar_path, Some(&out)).await.unwrap();

        assert_eq!(conversion.zip_path, out);
        assert_eq!(std::fs::metadata(&out).unwrap().modified().unwrap(), stamp);
    }

    fn append_link(builder: &mut tar::Builder<File>, name: &str, target: &str, kind: EntryType) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(kind);
        header.set_size(0);
        header.set_mode(0o644);
        header.set_mtime(1_600_000_000);
        header.set_link_name(target).unwrap();
        builder.append_data(&mut header, name, io::empty()).unwrap();
    }

    #[tokio::test]
    async fn test_convert_keeps_hard_links_and_symlinks() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("links.tar");
        {
            let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
            append(&mut builder, "orig.txt", b"shared bytes", 1_600_000_000, EntryType::Regular);
            append_link(&mut builder, "link.txt", "orig.txt", EntryType::Link);
            append_link(&mut builder, "alias", "orig.txt", EntryType::Symlink);
            builder.finish().unwrap();
        }

        let conversion = TarConverter::convert(&tar_path, None).await.unwrap();
        assert_eq!(conversion.entries, 3);

        let mut archive = ZipArchive::new(File::open(&conversion.zip_path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["alias", "link.txt", "orig.txt"]);

        let mut content = String::new();
        archive.by_name("link.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "shared bytes");

        let mut alias = archive.by_name("alias").unwrap();
        assert_eq!(alias.unix_mode().map(|mode| mode & 0o170000), Some(0o120000));
        let mut target = String::new();
        alias.read_to_string(&mut target).unwrap();
        assert_eq!(target, "orig.txt");
    }

    #[tokio::test]
    async fn test_corrupt_tar_leaves_no_zip_behind() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("broken.tar");
        std::fs::write(&tar_path, vec![b'x'; 1024]).unwrap();

        assert!(TarConverter::convert(&tar_path, None).await.is_err());

        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("broken.tar")]);
    }

    #[tokio::test]
    async fn test_existing_zip_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("t.tar");
        {
            let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
            append(&mut builder, "a.txt", b"a", 1_600_000_000, EntryType::Regular);
            builder.finish().unwrap();
        }
        let zip_path = dir.path().join("t.zip");
        std::fs::write(&zip_path, b"somebody else's archive").unwrap();

        assert!(TarConverter::convert(&tar_path, None).await.is_err());
        assert_eq!(std::fs::read(&zip_path).unwrap(), b"somebody else's archive");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
