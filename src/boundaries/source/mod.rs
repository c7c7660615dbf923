
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::http::HttpClient;
use crate::{Result, WardError};

/// Where boundary GeoJSON comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySource {
    Remote(Url),
    Local(PathBuf),
}

impl BoundarySource {
    /// http(s) URLs are remote, `file://` URLs and anything else are local paths
    #[inline]
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_or_else(|()| Self::Local(PathBuf::from(source)), Self::Local),
            _ => Self::Local(PathBuf::from(source)),
        }
    }

    #[inline]
    pub fn location(&self) -> String {
        match self {
            Self::Remote(url) => url.to_string(),
            Self::Local(path) => path.display().to_string(),
        }
    }

    /// Read the raw GeoJSON text
    ///
    /// Remote sources are downloaded once into `cache_path` and served from
    /// there afterwards unless `refresh` is set.
    #[inline]
    pub fn fetch(
        &self,
        http: &HttpClient,
        user_agent: &str,
        cache_path: &Path,
        refresh: bool,
    ) -> Result<String> {
        match self {
            Self::Local(path) => read_local(path),
            Self::Remote(url) => {
                if !refresh && cache_path.exists() {
                    debug!("Using cached boundaries at {}", cache_path.display());
                    return read_local(cache_path);
                }

                info!("Downloading ward boundaries from {}", url);
                let text = http.get_text(url.as_str(), &[], user_agent).map_err(|e| {
                    WardError::DataUnavailable {
                        location: url.to_string(),
                        message: e.to_string(),
                    }
                })?;

                write_cache(cache_path, &text)?;
                Ok(text)
            }
        }
    }
}

fn read_local(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| WardError::DataUnavailable {
        location: path.display().to_string(),
        message: e.to_string(),
    })
}

fn write_cache(cache_path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(cache_path, text)?;
    debug!("Cached {} bytes at {}", text.len(), cache_path.display());
    Ok(())
}
