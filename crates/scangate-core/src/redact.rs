use regex::Regex;
use serde::Serializer;
use std::sync::OnceLock;

/// Mask credentials in a single command-line argument before it is shown to anyone.
///
/// Works on one argv element at a time so a secret containing whitespace is
/// masked whole. Only the displayed text changes; the process still receives
/// the real argument.
pub fn redact_argument(arg: &str) -> String {
    // -Dsonar.login=TOKEN, -Dsonar.token=TOKEN, -Dsonar.password=...
    if let Some(caps) = sonar_property_re().captures(arg) {
        return format!("{}=***", &caps["prop"]);
    }

    // -config api.key=KEY
    if let Some(found) = api_key_re().find(arg) {
        return format!("{}api.key=***", &arg[..found.start()]);
    }

    redact_url(arg)
}

/// Mask user credentials embedded in a URL (`https://user:pw@host` -> `https://***@host`).
pub fn redact_url(text: &str) -> String {
    url_userinfo_re()
        .replace_all(text, "${scheme}://***@")
        .to_string()
}

/// serde helper for optional URLs that may carry credentials.
pub fn serialize_redacted_url<S>(url: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match url {
        Some(url) => serializer.serialize_some(&redact_url(url)),
        None => serializer.serialize_none(),
    }
}

fn sonar_property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<prop>-Dsonar\.(?:login|token|password))=").expect("valid regex")
    })
}

fn api_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"api\.key=").expect("valid regex"))
}

fn url_userinfo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<scheme>https?)://[^/@]+@").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_sonar_login() {
        assert_eq!(redact_argument("-Dsonar.login=abc123"), "-Dsonar.login=***");
        assert_eq!(redact_argument("-Dsonar.token=abc123"), "-Dsonar.token=***");
        assert_eq!(redact_argument("-Dsonar.projectKey=app"), "-Dsonar.projectKey=app");
    }

    #[test]
    fn test_secret_with_whitespace_is_masked_whole() {
        let redacted = redact_argument("-Dsonar.login=abc secretpart");
        assert_eq!(redacted, "-Dsonar.login=***");

        let redacted = redact_argument("-config api.key=k3y with spaces");
        assert_eq!(redacted, "-config api.key=***");
    }

    #[test]
    fn test_redact_url_credentials() {
        let redacted = redact_argument("https://admin:pw@app.internal/");
        assert_eq!(redacted, "https://***@app.internal/");
    }

    #[test]
    fn test_plain_arguments_are_untouched() {
        for arg in ["active-scan", "-t", "http://x", "-r", "zap_report.html"] {
            assert_eq!(redact_argument(arg), arg);
        }
    }

    #[test]
    fn test_serialize_redacted_url() {
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut out);
        serialize_redacted_url(&Some("http://u:p@host/".to_string()), &mut serializer).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\"http://***@host/\"");
    }
}
