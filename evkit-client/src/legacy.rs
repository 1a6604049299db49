//! Redirects for old query-string surface links.
//!
//! Old links look like `?p=admin&tenant=abc&id=42`; current links are
//! `/abc/manage?id=42`.

use evkit_core::{escape_str, BrandId};

/// Old page name to current path segment.
const PAGE_MAP: &[(&str, &str)] = &[
    ("status", "status"),
    ("admin", "manage"),
    ("events", "events"),
    ("display", "display"),
    ("poster", "poster"),
    ("public", "public"),
    ("sponsor", "sponsors"),
    ("config", "config"),
    ("reports", "reports"),
    ("diagnostics", "diagnostics"),
];

/// Current path segment for an old page name. Unknown names are kept.
pub fn map_page(old: &str) -> &str {
    PAGE_MAP
        .iter()
        .find(|(from, _)| *from == old)
        .map(|(_, to)| *to)
        .unwrap_or(old)
}

/// Target URL for an old-style link, or `None` when the link is not one.
///
/// Page comes from `p` (or `page`), brand from `tenant`. Unrecognized
/// brands are not redirected. Every other parameter is appended in order.
pub fn legacy_page_redirect(params: &[(String, String)]) -> Option<String> {
    let lookup = |name: &str| {
        params
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    };
    let old_page = lookup("p").or_else(|| lookup("page"))?;
    let brand = BrandId::parse(lookup("tenant")?)?;

    let mut url = if old_page == "status" {
        format!("/status?tenant={}", brand)
    } else {
        format!("/{}/{}", brand, urlencoding::encode(map_page(old_page)))
    };

    for (key, value) in params {
        if matches!(key.as_str(), "p" | "page" | "tenant") {
            continue;
        }
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }

    tracing::debug!(page = old_page, %brand, target = %url, "Legacy link redirected");
    Some(url)
}

/// Meta-refresh document sending the browser to `url`.
pub fn redirect_html(url: &str) -> String {
    let url = escape_str(url);
    format!(
        "<!DOCTYPE html><html><head><title>Redirecting</title>\
         <meta http-equiv=\"refresh\" content=\"0;url={url}\"></head>\
         <body>Redirecting...</body></html>"
    )
}
