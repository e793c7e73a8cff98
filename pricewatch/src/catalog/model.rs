use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A product some user tracks. Identity is `id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedProduct {
    pub id: Uuid,
    pub shop: String,
    pub product_code: String,
    pub product_name: String,
    pub image_url: String,
}

/// Per-subscription dedup state for "price at or below target" alerts.
///
/// `Armed`: no alert has been delivered for the current excursion (or the
/// price has never reached the target).
/// `Notified`: an alert was delivered; nothing more is sent until the price
/// rises back above the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlertState {
    Armed,
    Notified,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Armed => "ARMED",
            AlertState::Notified => "NOTIFIED",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARMED" => Ok(AlertState::Armed),
            "NOTIFIED" => Ok(AlertState::Notified),
            other => Err(anyhow::anyhow!("unknown alert state: {other}")),
        }
    }
}

/// What a price observation does to one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Price went back above target after an alert: re-arm for the next excursion.
    Rearm,
    /// Price is at/below target and no alert was delivered yet: send one.
    Notify,
    Unchanged,
}

/// One user's target-price subscription to one product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingSubscription {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub target_price: u64,
    pub state: AlertState,
    pub alert_enabled: bool,
}

impl TrackingSubscription {
    /// Evaluates the target-price state machine against `current_price`.
    ///
    /// The re-arm branch is checked first and ignores `alert_enabled`, so a
    /// muted subscription still resets once the price recovers.
    pub fn evaluate(&self, current_price: u64) -> Transition {
        let at_or_below = self.target_price >= current_price;

        match self.state {
            AlertState::Notified if !at_or_below => Transition::Rearm,
            AlertState::Armed if at_or_below && self.alert_enabled => Transition::Notify,
            _ => Transition::Unchanged,
        }
    }

    pub fn rearm(&mut self) {
        self.state = AlertState::Armed;
    }

    /// Only called once the push provider accepted the alert.
    pub fn mark_notified(&mut self) {
        self.state = AlertState::Notified;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_sub(target_price: u64, state: AlertState, alert_enabled: bool) -> TrackingSubscription {
        TrackingSubscription {
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            target_price,
            state,
            alert_enabled,
        }
    }

    #[test]
    fn armed_at_or_below_target_notifies() {
        let s = mk_sub(100, AlertState::Armed, true);
        assert_eq!(s.evaluate(100), Transition::Notify);
        assert_eq!(s.evaluate(99), Transition::Notify);
        assert_eq!(s.evaluate(101), Transition::Unchanged);
    }

    #[test]
    fn armed_but_muted_never_notifies() {
        let s = mk_sub(100, AlertState::Armed, false);
        assert_eq!(s.evaluate(50), Transition::Unchanged);
    }

    #[test]
    fn notified_rearms_only_above_target() {
        let s = mk_sub(100, AlertState::Notified, true);
        assert_eq!(s.evaluate(85), Transition::Unchanged);
        assert_eq!(s.evaluate(100), Transition::Unchanged);
        assert_eq!(s.evaluate(130), Transition::Rearm);

        let muted = mk_sub(100, AlertState::Notified, false);
        assert_eq!(muted.evaluate(130), Transition::Rearm);
    }

    #[test]
    fn excursion_sequence_produces_two_alerts() {
        let mut s = mk_sub(100, AlertState::Armed, true);
        let mut alerts = 0;

        for price in [120, 90, 85, 130, 80] {
            match s.evaluate(price) {
                Transition::Notify => {
                    alerts += 1;
                    s.mark_notified();
                }
                Transition::Rearm => s.rearm(),
                Transition::Unchanged => {}
            }
        }

        assert_eq!(alerts, 2);
        assert_eq!(s.state, AlertState::Notified);
    }

    #[test]
    fn alert_state_parses_its_own_rendering() {
        for st in [AlertState::Armed, AlertState::Notified] {
            assert_eq!(st.as_str().parse::<AlertState>().unwrap(), st);
        }
        assert!("armed".parse::<AlertState>().is_err());
    }
}
