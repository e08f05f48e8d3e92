//! Email notifications via the Resend API. Best-effort: failures are logged
//! by callers and never affect a job's outcome.

use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::error::{IndexError, Result};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct EmailClient {
    http: reqwest::Client,
    api_key: String,
    from: String,
    base_url: String,
}

impl EmailClient {
    /// Returns `None` when no API key is configured, disabling email.
    pub fn new(api_key: &str, from: &str, base_url: &str) -> Option<Self> {
        if api_key.is_empty() {
            return None;
        }
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build().ok()?;
        Some(Self {
            http,
            api_key: api_key.to_string(),
            from: from.to_string(),
            base_url: base_url.to_string(),
        })
    }

    /// Sends the "docs are ready" email.
    pub async fn send_indexing_complete(&self, to: &str, repo_full_name: &str) -> Result<()> {
        let link = format!("{}/repos/{}", self.base_url, repo_full_name);
        let subject = format!("Your docs for {repo_full_name} are ready!");
        let body = format!(
            r#"<html><body>
<h2>Your documentation is ready!</h2>
<p>We've finished indexing <strong>{}</strong>.</p>
<p><a href="{}" style="display:inline-block;padding:10px 20px;background:#2563eb;color:#fff;text-decoration:none;border-radius:6px;">View Documentation</a></p>
<p style="color:#666;font-size:12px;">&mdash; QuickDocs</p>
</body></html>"#,
            escape_html(repo_full_name),
            escape_html(&link),
        );

        self.send(to, &subject, &body).await
    }

    /// Sends the "indexing failed" email with the terminal error message.
    pub async fn send_indexing_failed(
        &self,
        to: &str,
        repo_full_name: &str,
        error_message: &str,
    ) -> Result<()> {
        let link = format!("{}/repos/{}", self.base_url, repo_full_name);
        let subject = format!("We couldn't index {repo_full_name}");
        let body = format!(
            r#"<html><body>
<h2>Indexing failed</h2>
<p>We weren't able to generate documentation for <strong>{}</strong>.</p>
<p><strong>Error:</strong> {}</p>
<p><a href="{}" style="display:inline-block;padding:10px 20px;background:#2563eb;color:#fff;text-decoration:none;border-radius:6px;">Try Again</a></p>
<p style="color:#666;font-size:12px;">&mdash; QuickDocs</p>
</body></html>"#,
            escape_html(repo_full_name),
            escape_html(error_message),
            escape_html(&link),
        );

        self.send(to, &subject, &body).await
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "html": html_body,
        });

        let resp = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("email send returned {} for {to}", status.as_u16());
            return Err(IndexError::Internal(format!(
                "Resend API returned status {}",
                status.as_u16()
            )));
        }

        info!("email sent to {to}: {subject}");
        Ok(())
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_api_key() {
        assert!(EmailClient::new("", "a@b.c", "http://localhost").is_none());
        assert!(EmailClient::new("re_123", "a@b.c", "http://localhost").is_some());
    }

    #[test]
    fn escapes_html_entities() {
        assert_eq!(
            escape_html(r#"<script>"x" & 'y'</script>"#),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }
}
