//! Errors produced while loading a model.
//!
//! Load failures are terminal for the attempt that produced them: they are
//! logged once by the [`crate::model_manager::ModelManager`] and never bubble
//! up to the event loop. A model without animation clips is not an error.

use thiserror::Error;

/// Why a model could not be loaded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The asset could not be fetched (missing file, HTTP error status, I/O).
    #[error("could not fetch model {path}: {reason}")]
    Network { path: String, reason: String },

    /// The server answered with an HTML document where a binary model was
    /// expected, which is what a static file server's 404 page looks like.
    #[error("received HTML instead of a model for {path} (file not found?)")]
    HtmlDocument { path: String },

    /// The payload is not a usable glTF/GLB file.
    #[error("could not decode model {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Coarse classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    Network,
    Parse,
}

impl LoadError {
    pub fn network(path: &str, reason: impl ToString) -> Self {
        Self::Network {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(path: &str, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::Network { .. } => LoadErrorKind::Network,
            LoadError::HtmlDocument { .. } | LoadError::Parse { .. } => LoadErrorKind::Parse,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            LoadError::Network { path, .. }
            | LoadError::HtmlDocument { path }
            | LoadError::Parse { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_documents_are_parse_errors() {
        let err = LoadError::HtmlDocument {
            path: "Soldier.glb".to_string(),
        };
        assert_eq!(err.kind(), LoadErrorKind::Parse);
        assert_eq!(err.path(), "Soldier.glb");
        assert!(err.to_string().contains("HTML"));
    }

    #[test]
    fn fetch_failures_are_network_errors() {
        let err = LoadError::network("LittlestTokyo.glb", "404 Not Found");
        assert_eq!(err.kind(), LoadErrorKind::Network);
        assert!(err.to_string().contains("404 Not Found"));
    }
}
