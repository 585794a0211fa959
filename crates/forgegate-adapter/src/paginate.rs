//! `Link` header parsing for paginated upstream listings.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, LINK};

use crate::{Error, Result};

/// Parses a `Link` header value into a relation -> URL map.
///
/// Entries look like `<https://host/page=2>; rel="next"`. If a relation
/// repeats, the last occurrence wins.
pub fn parse_link_header(link: &str) -> Result<HashMap<String, String>> {
    let mut relations = HashMap::new();

    for item in link.split(',') {
        if item.trim().is_empty() {
            continue;
        }

        let mut parts = item.split(';').map(str::trim);
        let raw_link = parts.next().unwrap_or_default();
        let rel = parts.next().unwrap_or_default();

        let url = raw_link
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| {
                Error::MalformedLinkHeader(format!(
                    "expected link to be enclosed in brackets: {raw_link}"
                ))
            })?;
        let name = rel.strip_prefix("rel=").ok_or_else(|| {
            Error::MalformedLinkHeader(format!("expected link to have a rel part: {item}"))
        })?;

        relations.insert(remove_quotes(name).to_string(), url.to_string());
    }

    Ok(relations)
}

/// Returns the `next` relation of a response, if it has one.
pub fn next_link(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(LINK) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|err| Error::MalformedLinkHeader(err.to_string()))?;

    Ok(parse_link_header(value)?.remove("next"))
}

fn remove_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            text.strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn parses_next_and_prev() {
        let relations =
            parse_link_header(r#"<https://a>; rel="next", <https://b>; rel="prev""#).unwrap();
        assert_eq!(relations.len(), 2);
        assert_eq!(relations["next"], "https://a");
        assert_eq!(relations["prev"], "https://b");
    }

    #[test]
    fn strips_single_quotes_and_bare_names() {
        let relations =
            parse_link_header("<https://a>; rel='first', <https://b>; rel=last").unwrap();
        assert_eq!(relations["first"], "https://a");
        assert_eq!(relations["last"], "https://b");
    }

    #[test]
    fn last_occurrence_wins() {
        let relations =
            parse_link_header(r#"<https://a>; rel="next", <https://b>; rel="next""#).unwrap();
        assert_eq!(relations["next"], "https://b");
    }

    #[test]
    fn keeps_query_strings_intact() {
        let relations = parse_link_header(
            r#"<https://gitlab.com/api/v4/projects?page=2&per_page=100&search=auth>; rel="next""#,
        )
        .unwrap();
        assert_eq!(
            relations["next"],
            "https://gitlab.com/api/v4/projects?page=2&per_page=100&search=auth"
        );
    }

    #[test]
    fn rejects_unbracketed_url() {
        let err = parse_link_header(r#"https://a; rel="next""#).unwrap_err();
        assert!(matches!(err, Error::MalformedLinkHeader(_)));
    }

    #[test]
    fn rejects_missing_rel() {
        let err = parse_link_header(r#"<https://a>; title="next""#).unwrap_err();
        assert!(matches!(err, Error::MalformedLinkHeader(_)));

        let err = parse_link_header("<https://a>").unwrap_err();
        assert!(matches!(err, Error::MalformedLinkHeader(_)));
    }

    #[test]
    fn empty_header_has_no_relations() {
        assert!(parse_link_header("").unwrap().is_empty());
    }

    #[test]
    fn next_link_reads_response_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_link(&headers).unwrap(), None);

        headers.insert(
            LINK,
            HeaderValue::from_static(r#"<https://a?page=3>; rel="next", <https://a?page=9>; rel="last""#),
        );
        assert_eq!(next_link(&headers).unwrap().as_deref(), Some("https://a?page=3"));

        headers.insert(LINK, HeaderValue::from_static(r#"<https://a?page=1>; rel="first""#));
        assert_eq!(next_link(&headers).unwrap(), None);
    }
}
