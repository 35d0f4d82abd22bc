//! # Format Classifier
//!
//! Fixed dispatch table from a file extension to the strategy that repacks it.
//! Extensions whose helper is missing from the [`ToolTable`] and that have no
//! built-in fallback classify as [`Strategy::Unsupported`].

use crate::ooxml::OoxmlKind;
use crate::tool_resolver::{Tool, ToolTable};
use std::fmt;
use std::path::Path;

/// Formats handed to the PNG optimizer without the backup/compare step
const ALTERNATE_IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "tif", "tiff"];

/// Every extension in the dispatch table, in display order
const KNOWN_EXTENSIONS: &[&str] = &[
    "zip", "docx", "xlsx", "pptx", "png", "bmp", "gif", "tif", "tiff", "jpg", "jpeg", "h5", "hdf5", "tar",
];

/// Processing strategy selected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ArchiveRepack,
    OoxmlRepack(OoxmlKind),
    PngOptimize,
    JpegOptimize,
    Hdf5Repack,
    TarConvert,
    Unsupported,
}

impl Strategy {
    /// Helper the strategy cannot run without, if any
    pub fn prerequisite(&self) -> Option<Tool> {
        match self {
            Strategy::PngOptimize => Some(Tool::PngOptimizer),
            Strategy::JpegOptimize => Some(Tool::JpegOptimizer),
            Strategy::Hdf5Repack => Some(Tool::Hdf5Repacker),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ArchiveRepack => f.write_str("archive-repack"),
            Strategy::OoxmlRepack(_) => f.write_str("ooxml-repack"),
            Strategy::PngOptimize => f.write_str("png-optimize"),
            Strategy::JpegOptimize => f.write_str("jpeg-optimize"),
            Strategy::Hdf5Repack => f.write_str("hdf5-repack"),
            Strategy::TarConvert => f.write_str("tar-convert"),
            Strategy::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// Maps extensions to strategies for one resolved tool table
pub struct FormatClassifier<'a> {
    tools: &'a ToolTable,
}

impl<'a> FormatClassifier<'a> {
    pub fn new(tools: &'a ToolTable) -> Self {
        Self { tools }
    }

    /// Classify a lowercased extension (without the leading dot)
    pub fn classify(&self, ext: &str) -> Strategy {
        let strategy = Self::table_lookup(ext);
        match strategy.prerequisite() {
            Some(tool) if !self.tools.contains(tool) => Strategy::Unsupported,
            _ => strategy,
        }
    }

    /// Classify a path by its extension, case-insensitively
    pub fn classify_path(&self, path: &Path) -> Strategy {
        match lowercase_extension(path) {
            Some(ext) => self.classify(&ext),
            None => Strategy::Unsupported,
        }
    }

    /// Extensions accepted with the current tool table
    pub fn accepted_extensions(&self) -> Vec<&'static str> {
        KNOWN_EXTENSIONS
            .iter()
            .copied()
            .filter(|ext| self.classify(ext) != Strategy::Unsupported)
            .collect()
    }

    fn table_lookup(ext: &str) -> Strategy {
        match ext {
            "zip" => Strategy::ArchiveRepack,
            "docx" => Strategy::OoxmlRepack(OoxmlKind::Word),
            "xlsx" => Strategy::OoxmlRepack(OoxmlKind::Excel),
            "pptx" => Strategy::OoxmlRepack(OoxmlKind::PowerPoint),
            "png" | "bmp" | "gif" | "tif" | "tiff" => Strategy::PngOptimize,
            "jpg" | "jpeg" => Strategy::JpegOptimize,
            "h5" | "hdf5" => Strategy::Hdf5Repack,
            "tar" => Strategy::TarConvert,
            _ => Strategy::Unsupported,
        }
    }
}

/// BMP/GIF/TIFF: optimized in place by the PNG optimizer
pub fn is_alternate_image(ext: &str) -> bool {
    ALTERNATE_IMAGE_EXTENSIONS.contains(&ext)
}

/// Lowercased extension of a path, if it has a valid UTF-8 one
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
