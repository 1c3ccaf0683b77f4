//! Confirmed-alert side effects.
//!
//! The dispatcher sits after the debounce streak. It only ever fires while the
//! state is `Confirmed`: once on entry, then at most once per `repeat_interval`
//! processed frames. The interval is measured from the last firing within one
//! run of the loop, so a streak that breaks and re-confirms quickly does not
//! re-trigger the siren early. `reset` starts a fresh cadence.
//!
//! Sinks are best-effort. A failing sink is logged and skipped; the session
//! never stops because a speaker is missing.

mod sinks;

pub use sinks::{SoundSink, VoiceSink};

use anyhow::Result;

use crate::config::AlertSettings;
use crate::debounce::{AlertState, Banner};

/// One alert firing.
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub state: AlertState,
    /// Processed-frame counter at the time of firing (1-based).
    pub processed_index: u64,
    pub banner: Banner,
}

/// Receives confirmed alerts.
pub trait AlertSink {
    fn name(&self) -> &str;
    fn fire(&mut self, alert: &Alert) -> Result<()>;
}

pub struct AlertDispatcher {
    repeat_interval: u64,
    confirm_at: u32,
    last_fired: Option<u64>,
    fired: u64,
    sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertDispatcher {
    /// `repeat_interval` is clamped to at least 1.
    pub fn new(repeat_interval: u64, confirm_at: u32) -> Self {
        Self {
            repeat_interval: repeat_interval.max(1),
            confirm_at,
            last_fired: None,
            fired: 0,
            sinks: Vec::new(),
        }
    }

    /// Dispatcher with the sound sink, plus the voice sink when configured.
    pub fn from_settings(settings: &AlertSettings) -> Self {
        let mut dispatcher = Self::new(settings.repeat_interval, settings.confirm_streak)
            .with_sink(SoundSink::new(
                settings.sound_path.clone(),
                settings.sound_player.clone(),
            ));
        if let Some(voice) = VoiceSink::from_settings(settings) {
            dispatcher = dispatcher.with_sink(voice);
        }
        dispatcher
    }

    pub fn with_sink<S: AlertSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Feed the state after one processed frame. Returns the alert when the
    /// sinks were fired.
    pub fn on_processed_frame(&mut self, state: AlertState, processed_index: u64) -> Option<Alert> {
        if !state.is_confirmed() {
            return None;
        }
        if let Some(last) = self.last_fired {
            if processed_index.saturating_sub(last) < self.repeat_interval {
                return None;
            }
        }

        let alert = Alert {
            state,
            processed_index,
            banner: Banner::for_state(state, self.confirm_at),
        };
        log::warn!(
            "alert: {} (streak {}, processed frame {})",
            alert.banner,
            state.streak(),
            processed_index
        );
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.fire(&alert) {
                log::warn!("alert sink {} failed: {:#}", sink.name(), err);
            }
        }
        self.last_fired = Some(processed_index);
        self.fired += 1;
        Some(alert)
    }

    /// Forget previous firings; the next confirmed frame fires immediately.
    pub fn reset(&mut self) {
        self.last_fired = None;
        self.fired = 0;
    }

    /// Number of firings so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn repeat_interval(&self) -> u64 {
        self.repeat_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording(Rc<RefCell<Vec<u64>>>);

    impl AlertSink for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn fire(&mut self, alert: &Alert) -> Result<()> {
            self.0.borrow_mut().push(alert.processed_index);
            Ok(())
        }
    }

    struct Broken;

    impl AlertSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn fire(&mut self, _alert: &Alert) -> Result<()> {
            Err(anyhow!("no audio device"))
        }
    }

    fn dispatcher(interval: u64) -> (AlertDispatcher, Rc<RefCell<Vec<u64>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let d = AlertDispatcher::new(interval, 4).with_sink(Recording(log.clone()));
        (d, log)
    }

    #[test]
    fn never_fires_below_confirmed() {
        let (mut d, log) = dispatcher(100);
        assert!(d.on_processed_frame(AlertState::Normal, 1).is_none());
        assert!(d.on_processed_frame(AlertState::Suspect(3), 2).is_none());
        assert!(log.borrow().is_empty());
        assert_eq!(d.fired(), 0);
    }

    #[test]
    fn fires_on_entry_then_once_per_interval() {
        let (mut d, log) = dispatcher(100);
        for idx in 1..=250u64 {
            d.on_processed_frame(AlertState::Confirmed(4 + idx as u32), idx);
        }
        assert_eq!(*log.borrow(), vec![1, 101, 201]);
    }

    #[test]
    fn reconfirming_inside_interval_stays_quiet() {
        let (mut d, log) = dispatcher(100);
        let fired = d.on_processed_frame(AlertState::Confirmed(4), 10);
        assert_eq!(fired.map(|a| a.banner), Some(Banner::FireConfirmed));
        d.on_processed_frame(AlertState::Normal, 11);
        assert!(d.on_processed_frame(AlertState::Confirmed(4), 20).is_none());
        assert!(d.on_processed_frame(AlertState::Confirmed(5), 110).is_some());
        assert_eq!(*log.borrow(), vec![10, 110]);
    }

    #[test]
    fn reset_starts_a_fresh_cadence() {
        let (mut d, log) = dispatcher(100);
        assert!(d.on_processed_frame(AlertState::Confirmed(4), 4).is_some());
        d.reset();
        assert_eq!(d.fired(), 0);
        assert!(d.on_processed_frame(AlertState::Confirmed(4), 4).is_some());
        assert_eq!(*log.borrow(), vec![4, 4]);
    }

    #[test]
    fn sink_failure_does_not_block_other_sinks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut d = AlertDispatcher::new(100, 4)
            .with_sink(Broken)
            .with_sink(Recording(log.clone()));
        assert!(d.on_processed_frame(AlertState::Confirmed(4), 7).is_some());
        assert_eq!(*log.borrow(), vec![7]);
        assert_eq!(d.sink_names(), vec!["broken", "recording"]);
    }
}
