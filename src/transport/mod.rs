//! Outbound notification transport.
//!
//! This module provides the manual "dispatch fire team" action: an optional
//! spoken announcement followed by one SMS carrying the incident coordinates.
//! Delivery goes through the `SmsTransport` trait; `TwilioTransport` is the
//! production implementation.

mod twilio;

pub use twilio::TwilioTransport;

use anyhow::Result;

use crate::alert::VoiceSink;
use crate::config::SmsSettings;

pub const DISPATCH_ANNOUNCEMENT: &str = "Dispatching emergency units to sector 4.";

/// One outbound text message with the credentials needed to send it.
#[derive(Clone, Debug)]
pub struct SmsRequest<'a> {
    pub api_base: &'a str,
    pub account_sid: &'a str,
    pub auth_token: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub body: &'a str,
}

pub trait SmsTransport {
    fn send(&self, request: &SmsRequest<'_>) -> Result<()>;
}

/// Result of a dispatch attempt. Failures are values, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { to: String },
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }
}

pub fn sms_body(lat: f64, lon: f64) -> String {
    format!(
        "SENTINEL ALERT: Fire Detected!\nLoc: {}, {}\nDrone dispatching immediately.",
        lat, lon
    )
}

/// Announce (when a voice is configured) and text the fire team.
pub fn dispatch_fire_team(
    settings: &SmsSettings,
    transport: &dyn SmsTransport,
    lat: f64,
    lon: f64,
    voice: Option<&VoiceSink>,
) -> DispatchOutcome {
    if let Some(voice) = voice {
        if let Err(err) = voice.speak(DISPATCH_ANNOUNCEMENT) {
            log::warn!("dispatch: announcement failed: {:#}", err);
        }
    }

    let (Some(account_sid), Some(auth_token), Some(from), Some(to)) = (
        nonempty(&settings.account_sid),
        nonempty(&settings.auth_token),
        nonempty(&settings.from),
        nonempty(&settings.to),
    ) else {
        let reason = format!(
            "Twilio credentials missing: {}",
            settings.missing_fields().join(", ")
        );
        log::warn!("dispatch: {}", reason);
        return DispatchOutcome::Failed(reason);
    };

    let body = sms_body(lat, lon);
    let request = SmsRequest {
        api_base: &settings.api_base,
        account_sid,
        auth_token,
        from,
        to,
        body: &body,
    };
    match transport.send(&request) {
        Ok(()) => {
            log::info!("dispatch: SMS sent to {}", to);
            DispatchOutcome::Sent { to: to.to_string() }
        }
        Err(err) => {
            let reason = format!("SMS failed: {:#}", err);
            log::warn!("dispatch: {}", reason);
            DispatchOutcome::Failed(reason)
        }
    }
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_coordinates() {
        assert_eq!(
            sms_body(30.7333, 76.7794),
            "SENTINEL ALERT: Fire Detected!\nLoc: 30.7333, 76.7794\nDrone dispatching immediately."
        );
    }

    #[test]
    fn outcome_helpers() {
        assert!(DispatchOutcome::Sent { to: "+15551234567".into() }.is_sent());
        assert!(!DispatchOutcome::Failed("x".into()).is_sent());
    }
}
