use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

use super::{SmsRequest, SmsTransport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Twilio Messages REST API over HTTPS.
pub struct TwilioTransport {
    agent: ureq::Agent,
}

impl TwilioTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { agent }
    }
}

impl Default for TwilioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// `{api_base}/2010-04-01/Accounts/{sid}/Messages.json` with the credentials as
/// URL userinfo, which the HTTP client turns into basic auth.
pub(crate) fn messages_url(request: &SmsRequest<'_>) -> Result<Url> {
    let base = Url::parse(request.api_base)
        .with_context(|| format!("invalid Twilio api base '{}'", request.api_base))?;
    let mut url = base
        .join(&format!(
            "2010-04-01/Accounts/{}/Messages.json",
            request.account_sid
        ))
        .context("build Twilio messages url")?;
    url.set_username(request.account_sid)
        .map_err(|_| anyhow!("Twilio api base cannot carry credentials"))?;
    url.set_password(Some(request.auth_token))
        .map_err(|_| anyhow!("Twilio api base cannot carry credentials"))?;
    Ok(url)
}

impl SmsTransport for TwilioTransport {
    fn send(&self, request: &SmsRequest<'_>) -> Result<()> {
        let url = messages_url(request)?;
        let response = self
            .agent
            .request_url("POST", &url)
            .send_form(&[
                ("To", request.to),
                ("From", request.from),
                ("Body", request.body),
            ]);
        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                Err(anyhow!("Twilio returned HTTP {}: {}", code, detail.trim()))
            }
            Err(err) => Err(anyhow::Error::new(err).context("Twilio request failed")),
        }
    }
}
