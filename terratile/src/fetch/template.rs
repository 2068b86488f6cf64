//! URL templating.
//!
//! Source URLs contain `${name}` placeholders resolved against a property
//! map built from request coordinates. An unresolved placeholder is a
//! configuration error; config loading validates every template's keys up
//! front so resolution cannot fail at request time.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-z0-9._]+)\}").expect("placeholder pattern"));

/// An URL template referenced a property that was not supplied.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown property \"{key}\" in URL template \"{template}\"")]
pub struct TemplateError {
    pub template: String,
    pub key: String,
}

/// Resolves every `${name}` placeholder in `template` against `properties`.
pub fn format_url(
    template: &str,
    properties: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let whole = captures.get(0).expect("match");
        let key = &captures[1];
        let value = properties.get(key).ok_or_else(|| TemplateError {
            template: template.to_string(),
            key: key.to_string(),
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Lists the placeholder keys a template references, for load-time
/// validation.
pub fn template_keys(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|c| c.get(1).expect("key group").as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_coordinates() {
        let url = format_url(
            "https://tiles.example.com/${x}/${z}.png",
            &props(&[("x", "42"), ("z", "-7")]),
        )
        .unwrap();
        assert_eq!(url, "https://tiles.example.com/42/-7.png");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let url = format_url("https://example.com/static.json", &props(&[])).unwrap();
        assert_eq!(url, "https://example.com/static.json");
    }

    #[test]
    fn test_unknown_property_fails() {
        let err = format_url("https://example.com/${zoom}/t.png", &props(&[("x", "1")])).unwrap_err();
        assert_eq!(err.key, "zoom");
    }

    #[test]
    fn test_repeated_placeholder() {
        let url = format_url("${x}-${x}", &props(&[("x", "9")])).unwrap();
        assert_eq!(url, "9-9");
    }

    #[test]
    fn test_template_keys() {
        assert_eq!(
            template_keys("https://e.com/${tile.x}/${tile.z}"),
            vec!["tile.x", "tile.z"]
        );
        assert!(template_keys("https://e.com/plain").is_empty());
    }
}
