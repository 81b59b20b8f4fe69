use url::Url;

const PREVIEW_CHARS: usize = 200;

/// Label for a hostname group: a leading `www.` is not shown.
pub fn display_label(hostname: &str) -> &str {
    hostname.strip_prefix("www.").unwrap_or(hostname)
}

/// `protocol//host/path`, or everything before `?` when the URL does not parse.
pub fn remove_query_parameters(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => String::new(),
            };
            format!("{}://{}{}", url.scheme(), host, url.path())
        }
        Err(_) => raw.split('?').next().unwrap_or(raw).to_string(),
    }
}

/// Split a URL into its `protocol//host` part and its path, the path being
/// `None` for the site root. Unparsable input comes back whole.
pub fn split_url(raw: &str) -> (String, Option<String>) {
    let Ok(url) = Url::parse(raw) else {
        return (raw.to_string(), None);
    };
    let cleaned = remove_query_parameters(raw);
    let path = url.path();
    if path.is_empty() || path == "/" {
        return (cleaned.trim_end_matches('/').to_string(), None);
    }
    let domain = cleaned
        .strip_suffix(path)
        .unwrap_or(&cleaned)
        .to_string();
    (domain, Some(path.to_string()))
}

/// Content shortened for a list card.
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}
