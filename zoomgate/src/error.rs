use thiserror::Error;

use crate::diagnostics::{DiagSet, Diagnostic};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// The single error currency inside the crate.
///
/// `Protocol` and `Backend` are the two kinds of failure the session
/// dispatcher understands and turns into a BIB-1 diagnostic on the reply
/// (see `session::dispatch`). Everything else -- `Io`, `Config`, `Other` --
/// is a programmer error: it propagates out of the dispatcher and kills the
/// session/process rather than being reported as a diagnostic.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    /// A client-protocol diagnostic the gateway itself decided to raise
    /// (bad attribute combination, unknown set name, missing mapping, ...).
    #[error("{0}")]
    Protocol(Diagnostic),

    /// A failure reported by the back-end/ZOOM layer, still tagged with the
    /// diagnostic set it arrived in. The dispatcher translates this into a
    /// BIB-1 `Diagnostic` before it ever reaches the client.
    #[error("backend error ({set:?}): {message}")]
    Backend {
        set: DiagSet,
        code: u32,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn protocol(code: u16, addinfo: impl Into<String>) -> Self {
        GatewayError::Protocol(Diagnostic {
            code,
            addinfo: addinfo.into(),
        })
    }

    pub fn backend(set: DiagSet, code: u32, message: impl Into<String>) -> Self {
        GatewayError::Backend {
            set,
            code,
            message: message.into(),
        }
    }

    /// The dispatcher's failure barrier (§4.1): `Protocol`/`Backend` are
    /// reportable diagnostics; everything else is a programmer error that
    /// should propagate and terminate the session rather than be reported.
    pub fn as_diagnostic(&self) -> Option<Diagnostic> {
        match self {
            GatewayError::Protocol(d) => Some(d.clone()),
            GatewayError::Backend { set, code, message } => {
                Some(crate::diagnostics::translate_backend_error(*set, *code, message))
            }
            GatewayError::Io(_) | GatewayError::Config(_) | GatewayError::Other(_) => None,
        }
    }
}
