//! HTTP backends.

pub mod http_reranker;
pub mod openai_embedder;

/// Joins a base URL and an API path, tolerating a base that already ends in `/v1`.
pub(crate) fn api_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    match base.strip_suffix("/v1") {
        Some(root) => format!("{root}/v1/{path}"),
        None => format!("{base}/v1/{path}"),
    }
}
