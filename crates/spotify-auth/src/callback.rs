//! Parsing of the redirect the browser lands on after authorization

use tracing::warn;

use crate::error::{Error, Result};

/// `code` and `error` query parameters from the redirect URL.
///
/// Values are passed through untouched; validation is the session's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_redirect_url(redirect: &str) -> Result<Self> {
        let url = reqwest::Url::parse(redirect.trim()).map_err(|e| {
            warn!(error = %e, "unparseable redirect URL");
            Error::InvalidCode
        })?;
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if params.code.is_none() => params.code = Some(value.into_owned()),
                "error" if params.error.is_none() => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}
