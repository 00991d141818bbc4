//! The optional HTTP credential side-channel consulted at Init (§4.1, §6).

use crate::diagnostics::code;
use crate::error::{GatewayError, Result};

const CREDENTIALS_BAD: &str = "credentials are bad";
const CREDENTIALS_MISSING: &str = "credentials not supplied";

/// Validate `username`/`password` against `template`, a URL carrying
/// `{user}`/`{pass}` placeholders. A 2xx response accepts; anything else,
/// or missing credentials, is diagnostic 1014.
pub async fn check(http: &reqwest::Client, template: &str, username: Option<&str>, password: Option<&str>) -> Result<()> {
    let (username, password) = match (username, password) {
        (Some(u), Some(p)) => (u, p),
        _ => return Err(GatewayError::protocol(code::CREDENTIALS_BAD, CREDENTIALS_MISSING)),
    };

    let url = template
        .replace("{user}", &urlencoding::encode(username))
        .replace("{pass}", &urlencoding::encode(password));

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| GatewayError::protocol(code::CREDENTIALS_BAD, format!("{CREDENTIALS_BAD}: {e}")))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(GatewayError::protocol(code::CREDENTIALS_BAD, CREDENTIALS_BAD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_fail_fast_without_a_request() {
        let http = reqwest::Client::new();
        let err = check(&http, "https://auth.example/{user}/{pass}", None, None)
            .await
            .unwrap_err();
        match err {
            GatewayError::Protocol(d) => {
                assert_eq!(d.code, code::CREDENTIALS_BAD);
                assert_eq!(d.addinfo, CREDENTIALS_MISSING);
            }
            _ => panic!("expected protocol diagnostic"),
        }
    }

    #[test]
    fn template_substitution_url_encodes_credentials() {
        let template = "https://auth.example/check?user={user}&pass={pass}";
        let url = template
            .replace("{user}", &urlencoding::encode("a b"))
            .replace("{pass}", &urlencoding::encode("p@ss"));
        assert_eq!(url, "https://auth.example/check?user=a%20b&pass=p%40ss");
    }
}
