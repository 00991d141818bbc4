//! Database-name resolution: real (configured) databases vs. ad-hoc
//! `cfg:k=v&k=v&...` virtual databases.

use crate::config::{DatabaseConfig, GatewayConfig};
use crate::diagnostics::code;
use crate::error::{GatewayError, Result};

const VIRTUAL_PREFIX: &str = "cfg:";
const DEFAULT_TIMEOUT: &str = "120";
const DEFAULT_SRU: &str = "get";

/// Resolve a request's `DATABASES` list to a single `DatabaseConfig`.
///
/// - More than one name -> diagnostic 111.
/// - A name beginning with `cfg:` is parsed as an ad-hoc database; the
///   global `search` block (if any) is inherited.
/// - Otherwise the name is looked up in `config.database`; missing -> 235.
pub fn resolve<'a>(
    config: &'a GatewayConfig,
    databases: &[String],
) -> Result<std::borrow::Cow<'a, DatabaseConfig>> {
    if databases.len() > 1 {
        return Err(GatewayError::protocol(
            code::TOO_MANY_DATABASES,
            databases.join(","),
        ));
    }

    let name = databases
        .first()
        .ok_or_else(|| GatewayError::protocol(code::TOO_MANY_DATABASES, ""))?;

    if let Some(rest) = name.strip_prefix(VIRTUAL_PREFIX) {
        return parse_virtual(config, name, rest).map(std::borrow::Cow::Owned);
    }

    config
        .lookup(name)
        .map(std::borrow::Cow::Borrowed)
        .ok_or_else(|| GatewayError::protocol(code::DATABASE_UNAVAILABLE, name.clone()))
}

fn parse_virtual(config: &GatewayConfig, original: &str, rest: &str) -> Result<DatabaseConfig> {
    let mut db = DatabaseConfig {
        search: config.search.clone(),
        ..Default::default()
    };

    let mut address: Option<String> = None;
    db.option.insert("timeout".to_string(), DEFAULT_TIMEOUT.to_string());
    db.option.insert("sru".to_string(), DEFAULT_SRU.to_string());

    for pair in rest.split('&') {
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key == "address" {
            address = Some(value.to_string());
        } else {
            db.option.insert(key.to_string(), value.to_string());
        }
    }

    let address = address.ok_or_else(|| GatewayError::protocol(code::CONFIG_ERROR, original.to_string()))?;
    db.zurl = address;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_databases_is_111() {
        let cfg = GatewayConfig::default();
        let err = resolve(&cfg, &["a".into(), "b".into()]).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == 111));
    }

    #[test]
    fn unknown_database_is_235() {
        let cfg = GatewayConfig::default();
        let err = resolve(&cfg, &["nope".into()]).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == 235));
    }

    #[test]
    fn virtual_database_requires_address() {
        let cfg = GatewayConfig::default();
        let err = resolve(&cfg, &["cfg:timeout=30".into()]).unwrap_err();
        match err {
            GatewayError::Protocol(d) => {
                assert_eq!(d.code, 1);
                assert_eq!(d.addinfo, "cfg:timeout=30");
            }
            _ => panic!("expected protocol diagnostic"),
        }
    }

    #[test]
    fn virtual_database_parses_options() {
        let cfg = GatewayConfig::default();
        let resolved = resolve(&cfg, &["cfg:address=http://x/&foo=bar".into()]).unwrap();
        assert_eq!(resolved.zurl, "http://x/");
        assert_eq!(resolved.option.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(resolved.option.get("timeout").map(String::as_str), Some("120"));
    }
}
