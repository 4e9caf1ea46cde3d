use axum::http::HeaderMap;

/// Best-effort client address for rate-limit subject keys. Trusts the usual
/// proxy headers; the connection address itself is the composition root's
/// concern.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            let first = value.split(',').next().map(str::trim);
            if let Some(ip) = first.filter(|ip| !ip.is_empty()) {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Rate-limit subject key for a request.
pub fn ip_rate_key(headers: &HeaderMap) -> Option<String> {
    client_ip(headers).map(|ip| format!("ip:{ip}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());

        assert_eq!(ip_rate_key(&headers).as_deref(), Some("ip:1.2.3.4"));
    }

    #[test]
    fn falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());
        assert_eq!(ip_rate_key(&headers).as_deref(), Some("ip:9.9.9.9"));
    }

    #[test]
    fn missing_headers_yield_none() {
        assert_eq!(ip_rate_key(&HeaderMap::new()), None);
    }
}
