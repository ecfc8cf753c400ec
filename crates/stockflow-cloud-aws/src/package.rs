//! Function archives for the `provided.al2023` runtime
//!
//! Each function ships as a zip holding one executable named `bootstrap`.
//! The binaries are expected to be cross-compiled already; packaging only
//! reads them from the artifact directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use stockflow_cloud::{CloudError, FunctionSource, ResourceKind, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const BOOTSTRAP: &str = "bootstrap";

pub struct ZipPackager {
    artifact_dir: PathBuf,
    build_dir: PathBuf,
}

impl ZipPackager {
    pub fn new(artifact_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            build_dir: build_dir.into(),
        }
    }

    /// Executable name of the function binary
    pub fn binary_name(kind: ResourceKind) -> Result<&'static str> {
        match kind {
            ResourceKind::LoaderFunction => Ok("load_inventory"),
            ResourceKind::QueryFunction => Ok("get_inventory_api"),
            ResourceKind::NotifyFunction => Ok("notify_low_stock"),
            other => Err(CloudError::PackagingFailed(format!("{} is not a function", other))),
        }
    }

    fn write_zip(binary: &Path, zip_path: &Path) -> std::io::Result<()> {
        let contents = fs::read(binary)?;
        let file = File::create(zip_path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o755);
        zip.start_file(BOOTSTRAP, options)?;
        zip.write_all(&contents)?;
        zip.finish()?;
        Ok(())
    }
}

impl FunctionSource for ZipPackager {
    fn archive(&self, kind: ResourceKind, function_name: &str) -> Result<Vec<u8>> {
        let binary = self.artifact_dir.join(Self::binary_name(kind)?);
        if !binary.is_file() {
            return Err(CloudError::PackagingFailed(format!(
                "binary not found: {} (build the functions first)",
                binary.display()
            )));
        }

        fs::create_dir_all(&self.build_dir).map_err(|e| {
            CloudError::PackagingFailed(format!("{}: {}", self.build_dir.display(), e))
        })?;
        let zip_path = self.build_dir.join(format!("{}.zip", function_name));
        Self::write_zip(&binary, &zip_path)
            .map_err(|e| CloudError::PackagingFailed(format!("{}: {}", zip_path.display(), e)))?;
        tracing::debug!("Wrote {}", zip_path.display());

        fs::read(&zip_path)
            .map_err(|e| CloudError::PackagingFailed(format!("{}: {}", zip_path.display(), e)))
    }
}
