//! # Archive Repacking Module
//!
//! Questo modulo ricostruisce archivi ZIP con la compressione massima.
//!
//! ## Responsabilità:
//! - `ScratchDir`: directory temporanea di estrazione, rimossa sempre al drop
//! - Estrazione sicura di un archivio ZIP (nomi fuori dalla directory scartati)
//! - Repack tramite `7z` quando disponibile, altrimenti writer interno `zip`
//! - Conversione timestamp epoch <-> tupla locale ZIP (usata anche da `tar_convert`)
//!
//! ## Pipeline:
//! 1. **Con 7z**: estrai in `ScratchDir` → `7z a -tzip -mx=9 -r <dest> *` → drop
//! 2. **Senza 7z**: copia in streaming ogni entry con Deflate livello 9,
//!    mantenendo ordine, nomi, directory, permessi unix e data di modifica
//!
//! Se 7z fallisce il contenuto già estratto viene impacchettato dal writer
//! interno, quindi l'output resta sempre un archivio valido.

use crate::args;
use crate::error::OptimizeError;
use crate::process::run_tool;
use crate::tool_resolver::{Tool, ToolTable};
use anyhow::{Context, Result};
use chrono::{Datelike, Local, LocalResult, NaiveDate, TimeZone, Timelike};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Scratch directory for extracted archive contents.
///
/// The directory lives in the system temp area and is removed when the guard
/// is dropped, on success and on every error path.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("rypak-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now and report failures instead of ignoring them
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("Failed to remove scratch directory {}", path.display()))?;
        debug!("Removed scratch directory {}", path.display());
        Ok(())
    }
}

/// Rebuilds ZIP archives with maximum compression
pub struct ArchiveRepacker<'a> {
    tools: &'a ToolTable,
}

impl<'a> ArchiveRepacker<'a> {
    pub fn new(tools: &'a ToolTable) -> Self {
        Self { tools }
    }

    /// Repack `source` into a new archive at `dest`
    pub async fn repack(&self, source: &Path, dest: &Path) -> Result<()> {
        if self.tools.contains(Tool::Packer) && !has_symlinks(source)? {
            let scratch = ScratchDir::new()?;
            extract_blocking(source, scratch.path()).await?;
            self.pack_dir(scratch.path(), dest).await?;
            scratch.close()
        } else {
            debug!("No external packer, streaming {} into {}", source.display(), dest.display());
            let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
            tokio::task::spawn_blocking(move || repack_stream(&source, &dest)).await?
        }
    }

    /// Pack the contents of `dir` (not the directory itself) into `dest`
    pub async fn pack_dir(&self, dir: &Path, dest: &Path) -> Result<()> {
        if let Some(packer) = self.tools.get(Tool::Packer) {
            let dest_abs = absolute(dest)?;
            let args = args!["a", "-tzip", "-mx=9", "-r", dest_abs.display(), "*"];
            if run_tool(packer, &args, Some(dir)).await? && dest_abs.exists() {
                return Ok(());
            }
            warn!("{} could not build {}, using built-in writer", Tool::Packer, dest.display());
            if dest_abs.exists() {
                tokio::fs::remove_file(&dest_abs).await?;
            }
        }

        let (dir, dest) = (dir.to_path_buf(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || write_dir_to_zip(&dir, &dest)).await?
    }
}

async fn extract_blocking(source: &Path, dest_dir: &Path) -> Result<()> {
    let (source, dest_dir) = (source.to_path_buf(), dest_dir.to_path_buf());
    tokio::task::spawn_blocking(move || extract_zip(&source, &dest_dir)).await?
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn best_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

fn is_symlink_mode(mode: Option<u32>) -> bool {
    mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
}

/// True when any entry of the archive is a unix symlink; 7z would store it as a file
fn has_symlinks(archive_path: &Path) -> Result<bool> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open ZIP archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).map_err(OptimizeError::from)?;
    for i in 0..archive.len() {
        if is_symlink_mode(archive.by_index_raw(i).map_err(OptimizeError::from)?.unix_mode()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Link target that stays inside the extraction directory
fn contained_link_target(target: &str) -> Option<&Path> {
    let path = Path::new(target);
    path.components()
        .all(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir))
        .then_some(path)
        .filter(|path| !path.as_os_str().is_empty())
}

/// Extract a ZIP archive into `dest_dir`, keeping the directory hierarchy.
///
/// Symlink entries become symlinks when their target stays inside `dest_dir`
/// (unix only); any other link is written as a regular file holding its target.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open ZIP archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).map_err(OptimizeError::from)?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(OptimizeError::from)?;

        let relative = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe entry name {:?} in {}", entry.name(), archive_path.display());
                continue;
            }
        };
        let output_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_symlink_mode(entry.unix_mode()) {
            let mut target = String::new();
            io::Read::read_to_string(&mut entry, &mut target)?;
            #[cfg(unix)]
            {
                if let Some(link) = contained_link_target(&target) {
                    std::os::unix::fs::symlink(link, &output_path)
                        .with_context(|| format!("Failed to create symlink {}", output_path.display()))?;
                    continue;
                }
            }
            warn!("Writing symlink {} -> {} as a regular file", relative.display(), target);
            fs::write(&output_path, target.as_bytes())?;
            continue;
        }

        let mut output_file = File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        io::copy(&mut entry, &mut output_file)
            .with_context(|| format!("Failed to extract {}", relative.display()))?;

        if let Some(modified) = entry.last_modified().and_then(|dt| system_time_from_zip(&dt)) {
            output_file.set_modified(modified)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&output_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }

    Ok(())
}

/// Stream every entry of `source` into a new Deflate-9 archive at `dest`.
///
/// Entry order, names, directory and symlink entries, unix permissions and
/// modification times are kept.
pub fn repack_stream(source: &Path, dest: &Path) -> Result<()> {
    let input = File::open(source)
        .with_context(|| format!("Failed to open ZIP archive {}", source.display()))?;
    let mut archive = ZipArchive::new(input).map_err(OptimizeError::from)?;

    let output = File::create(dest)
        .with_context(|| format!("Failed to create ZIP archive {}", dest.display()))?;
    let mut writer = ZipWriter::new(output);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(OptimizeError::from)?;
        let name = entry.name().to_string();

        let mut options = best_options()
            .last_modified_time(entry.last_modified().unwrap_or_default())
            .large_file(entry.size() >= u64::from(u32::MAX));
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        if entry.is_dir() {
            writer.add_directory(name, options).map_err(OptimizeError::from)?;
        } else if is_symlink_mode(entry.unix_mode()) {
            let mut target = String::new();
            io::Read::read_to_string(&mut entry, &mut target)
                .with_context(|| format!("Failed to read link target of {}", name))?;
            writer.add_symlink(name, target, options).map_err(OptimizeError::from)?;
        } else {
            writer.start_file(name.clone(), options).map_err(OptimizeError::from)?;
            io::copy(&mut entry, &mut writer)
                .with_context(|| format!("Failed to copy entry {} of {}", name, source.display()))?;
        }
    }

    writer.finish().map_err(OptimizeError::from)?;
    Ok(())
}

/// Pack a directory tree with the built-in writer, entries sorted by name
pub fn write_dir_to_zip(source_dir: &Path, dest: &Path) -> Result<()> {
    let output = File::create(dest)
        .with_context(|| format!("Failed to create ZIP archive {}", dest.display()))?;
    let mut writer = ZipWriter::new(output);

    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let relative = path
            .strip_prefix(source_dir)
            .map_err(|e| OptimizeError::Archive(format!("Failed to calculate relative path: {}", e)))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = entry.metadata()?;

        let mut options = best_options().large_file(metadata.len() >= u64::from(u32::MAX));
        if let Ok(modified) = metadata.modified() {
            options = options.last_modified_time(zip_datetime_from_system_time(modified));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        if metadata.file_type().is_symlink() {
            let target = fs::read_link(path)?;
            writer
                .add_symlink(name, target.to_string_lossy(), options)
                .map_err(OptimizeError::from)?;
        } else if metadata.is_dir() {
            writer.add_directory(name, options).map_err(OptimizeError::from)?;
        } else if metadata.is_file() {
            writer.start_file(name, options).map_err(OptimizeError::from)?;
            let mut file = File::open(path)?;
            io::copy(&mut file, &mut writer)?;
        } else {
            debug!("Skipping special file {}", path.display());
        }
    }

    writer.finish().map_err(OptimizeError::from)?;
    Ok(())
}

/// Local-time ZIP timestamp for whole epoch seconds.
///
/// Times the ZIP format cannot hold (before 1980, after 2107) map to
/// 1980-01-01 00:00:00.
pub fn zip_datetime_from_epoch(secs: i64) -> DateTime {
    let local = match Local.timestamp_opt(secs, 0) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => return DateTime::default(),
    };

    let (Ok(year), Ok(month), Ok(day), Ok(hour), Ok(minute), Ok(second)) = (
        u16::try_from(local.year()),
        u8::try_from(local.month()),
        u8::try_from(local.day()),
        u8::try_from(local.hour()),
        u8::try_from(local.minute()),
        u8::try_from(local.second()),
    ) else {
        return DateTime::default();
    };

    DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}

fn zip_datetime_from_system_time(time: SystemTime) -> DateTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => zip_datetime_from_epoch(i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)),
        Err(_) => DateTime::default(),
    }
}

/// Interpret a ZIP local-time tuple as a point in time
pub fn system_time_from_zip(dt: &DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?
        .and_hms_opt(u32::from(dt.hour()), u32::from(dt.minute()), u32::from(dt.second()))?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    let secs = u64::try_from(local.timestamp()).ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}
