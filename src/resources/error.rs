use std::fmt;

/// Errors produced while loading a model file.
#[derive(Debug)]
pub enum LoadError {
    /// The file (or one of its external buffers) could not be read or fetched.
    Missing {
        path: String,
        source: std::io::Error,
    },
    /// The file was found but is not valid glTF, or its accessors are broken.
    Malformed {
        path: String,
        reason: String,
        source: Option<gltf::Error>,
    },
    /// Valid glTF that uses something the loader cannot represent.
    Unsupported { path: String, reason: String },
}

impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            Self::Missing { path, .. }
            | Self::Malformed { path, .. }
            | Self::Unsupported { path, .. } => path,
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn unsupported(path: &str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path, source } => write!(f, "could not read {path}: {source}"),
            Self::Malformed { path, reason, .. } => {
                write!(f, "malformed model {path}: {reason}")
            }
            Self::Unsupported { path, reason } => {
                write!(f, "unsupported model {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Missing { source, .. } => Some(source),
            Self::Malformed {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn missing_keeps_the_io_cause() {
        let err = LoadError::Missing {
            path: "monkey.glb".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.path(), "monkey.glb");
        assert!(err.to_string().contains("monkey.glb"));
        assert!(err.source().is_some());
    }

    #[test]
    fn unsupported_has_no_cause() {
        let err = LoadError::unsupported("a.gltf", "data URI buffers");
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "unsupported model a.gltf: data URI buffers");
    }
}
