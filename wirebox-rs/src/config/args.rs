//! Command-line overrides: `-D key=value` / `--define key=value`.

use std::ffi::OsString;

use clap::{Args, Parser};
use wirebox_core::Properties;

use super::source::PropertySource;
use crate::error::AppError;

/// Defines given on the command line. Flatten it into an application's own parser with
/// `#[command(flatten)]`, or parse it alone with [`ArgsSource::try_parse_from`].
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgsSource {
    /// Set a property, e.g. `-D server.port=9090`. Repeatable.
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,
}

#[derive(Parser, Debug)]
#[command(name = "wirebox")]
struct DefinesOnly {
    #[command(flatten)]
    source: ArgsSource,
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_owned(), value.to_owned()))
}

impl ArgsSource {
    /// Parses `args`; the first item is the program name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(DefinesOnly::try_parse_from(args)?.source)
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            defines: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl PropertySource for ArgsSource {
    fn name(&self) -> &str {
        "command line"
    }

    fn load(&self, _loaded: &Properties) -> Result<Vec<(String, String)>, AppError> {
        Ok(self.defines.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_defines() {
        let src = ArgsSource::try_parse_from(["app", "-D", "a.b=1", "--define", "c=x=y", "-Dd="]).unwrap();
        assert_eq!(
            src.defines,
            vec![
                ("a.b".to_string(), "1".to_string()),
                ("c".to_string(), "x=y".to_string()),
                ("d".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_define() {
        assert!(matches!(ArgsSource::try_parse_from(["app", "-D", "novalue"]), Err(AppError::Args(_))));
        assert!(ArgsSource::try_parse_from(["app", "-D", "=v"]).is_err());
    }
}
