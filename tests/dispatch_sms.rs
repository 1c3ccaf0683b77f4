use std::cell::RefCell;

use anyhow::{anyhow, Result};

use forest_sentinel::config::{SentinelConfig, SmsSettings};
use forest_sentinel::transport::{
    dispatch_fire_team, sms_body, DispatchOutcome, SmsRequest, SmsTransport,
};

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    api_base: String,
    account_sid: String,
    from: String,
    to: String,
    body: String,
}

#[derive(Default)]
struct MockTransport {
    sent: RefCell<Vec<Sent>>,
    fail: bool,
}

impl SmsTransport for MockTransport {
    fn send(&self, request: &SmsRequest<'_>) -> Result<()> {
        if self.fail {
            return Err(anyhow!("HTTP 401: authenticate"));
        }
        self.sent.borrow_mut().push(Sent {
            api_base: request.api_base.to_string(),
            account_sid: request.account_sid.to_string(),
            from: request.from.to_string(),
            to: request.to.to_string(),
            body: request.body.to_string(),
        });
        Ok(())
    }
}

fn configured() -> SmsSettings {
    let mut sms = SentinelConfig::default().sms;
    sms.account_sid = Some("AC0001".into());
    sms.auth_token = Some("token".into());
    sms.from = Some("+15550001111".into());
    sms.to = Some("+919876543210".into());
    sms
}

#[test]
fn sends_coordinates_to_fire_team() {
    let transport = MockTransport::default();

    let outcome = dispatch_fire_team(&configured(), &transport, 30.7333, 76.7794, None);

    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            to: "+919876543210".into()
        }
    );
    let sent = transport.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].api_base, "https://api.twilio.com");
    assert_eq!(sent[0].account_sid, "AC0001");
    assert_eq!(sent[0].from, "+15550001111");
    assert_eq!(sent[0].body, sms_body(30.7333, 76.7794));
    assert!(sent[0].body.starts_with("SENTINEL ALERT: Fire Detected!\nLoc: 30.7333, 76.7794"));
}

#[test]
fn missing_credentials_fail_without_sending() {
    let transport = MockTransport::default();
    let mut sms = configured();
    sms.auth_token = None;
    sms.to = Some("  ".into());

    let outcome = dispatch_fire_team(&sms, &transport, 1.0, 2.0, None);

    match outcome {
        DispatchOutcome::Failed(reason) => {
            assert_eq!(reason, "Twilio credentials missing: auth_token, to")
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(transport.sent.borrow().is_empty());
}

#[test]
fn transport_errors_become_failed_outcome() {
    let transport = MockTransport {
        fail: true,
        ..MockTransport::default()
    };

    let outcome = dispatch_fire_team(&configured(), &transport, 1.0, 2.0, None);

    match outcome {
        DispatchOutcome::Failed(reason) => assert!(reason.contains("HTTP 401")),
        other => panic!("unexpected outcome {:?}", other),
    }
}
