use axum::http::{HeaderMap, header};

use crate::error::{RegistryError, RegistryResult};

/// Content type served for a file, picked by extension.
///
/// Browsers asking for TypeScript get `text/plain` so the source renders
/// instead of downloading.
pub fn content_type(path: &str, expects_html: bool) -> &'static str {
    let extension = extension(path);
    if expects_html && is_typescript(extension) {
        return "text/plain; charset=utf-8";
    }

    match extension {
        "ts" | "mts" | "cts" => "application/typescript; charset=utf-8",
        "tsx" => "text/tsx; charset=utf-8",
        "js" | "mjs" | "cjs" => "application/javascript; charset=utf-8",
        "jsx" => "text/jsx; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "jsonc" => "application/jsonc; charset=utf-8",
        "wasm" => "application/wasm",
        "md" => "text/markdown; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "toml" => "application/toml; charset=utf-8",
        "yaml" | "yml" => "application/yaml; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

fn extension(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

fn is_typescript(extension: &str) -> bool {
    matches!(extension, "ts" | "tsx" | "mts" | "cts")
}

/// True when the client prefers HTML, i.e. a browser.
pub fn expects_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.starts_with("text/html"))
}

/// Extracts a bearer token. Any other scheme is rejected; an empty token
/// counts as none.
pub fn bearer_token(headers: &HeaderMap) -> RegistryResult<Option<String>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| RegistryError::BadParams("authorization header is not valid text".into()))?;
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(RegistryError::BadParams(
            "only Bearer authorization is supported".into(),
        ));
    };
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}
