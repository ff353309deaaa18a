// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// File-name infix used by the compiled bytecode (`<name>.<ext>.spv`).
    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Source of precompiled SPIR-V. Implementations return raw bytecode and do
/// no decoding of their own.
pub trait ShaderLoader {
    /// Where the bytecode for `name`/`stage` comes from, for error reports.
    fn locate(&self, name: &str, stage: ShaderStage) -> PathBuf;

    fn load(&self, name: &str, stage: ShaderStage) -> io::Result<Vec<u8>>;
}

/// Reads `<root>/<name>.<stage>.spv` from disk.
#[derive(Clone, Debug)]
pub struct FsShaderLoader {
    root: PathBuf,
}

impl FsShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderLoader for FsShaderLoader {
    fn locate(&self, name: &str, stage: ShaderStage) -> PathBuf {
        self.root.join(format!("{name}.{}.spv", stage.extension()))
    }

    fn load(&self, name: &str, stage: ShaderStage) -> io::Result<Vec<u8>> {
        let path = self.locate(name, stage);
        let bytes = std::fs::read(&path)?;
        debug!("loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_paths_follow_convention() {
        let loader = FsShaderLoader::new("shaders");
        assert_eq!(loader.root(), Path::new("shaders"));
        assert_eq!(
            loader.locate("universal", ShaderStage::Vertex),
            Path::new("shaders").join("universal.vert.spv")
        );
        assert_eq!(
            loader.locate("universal", ShaderStage::Fragment),
            Path::new("shaders").join("universal.frag.spv")
        );
    }

    #[test]
    fn loads_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = [0x03u8, 0x02, 0x23, 0x07, 0xaa, 0xbb, 0xcc, 0xdd];
        std::fs::write(dir.path().join("tri.frag.spv"), bytes).unwrap();

        let loader = FsShaderLoader::new(dir.path());
        assert_eq!(loader.load("tri", ShaderStage::Fragment).unwrap(), bytes);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsShaderLoader::new(dir.path());
        let err = loader.load("nope", ShaderStage::Vertex).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn empty_size_detection() {
        assert!(RenderSize { width: 0, height: 600 }.is_empty());
        assert!(!RenderSize { width: 800, height: 600 }.is_empty());
    }
}
