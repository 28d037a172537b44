//! Page object for the simulator screen.
//!
//! Every method goes through [`SafeOps`], so readings come back as `Option`
//! and actions as `bool`; the state machine decides what a miss means.

use crate::safe_ops::SafeOps;
use crate::scripts;
use crate::strategy::Leg;
use rust_decimal::Decimal;
use serde_json::Value;
use simdrive_core::{CalendarDate, Locator, SimClock, SiteLayout, TimingConfig};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub struct SimulatorPage {
    ops: SafeOps,
    site: SiteLayout,
    timing: TimingConfig,
}

/// Parses a number as the simulator renders it: optional quotes, brackets,
/// percent sign and thousands separators, trailing text ignored.
#[must_use]
pub fn parse_number(text: &str) -> Option<Decimal> {
    let token = text.split_whitespace().next()?;
    let cleaned: String = token
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '(' | ')' | '%' | ',' | '+'))
        .collect();
    Decimal::from_str(&cleaned).ok()
}

impl SimulatorPage {
    #[must_use]
    pub fn new(ops: SafeOps, site: SiteLayout, timing: TimingConfig) -> Self {
        Self { ops, site, timing }
    }

    #[must_use]
    pub fn ops(&self) -> &SafeOps {
        &self.ops
    }

    async fn step_pause(&self) {
        tokio::time::sleep(self.timing.picker_step_pause).await;
    }

    /// Drives the date picker to `date`. Returns false if any step failed,
    /// including the day being disabled.
    pub async fn select_date(&self, date: CalendarDate) -> bool {
        if !self.ops.click(&Locator::css(&self.site.calendar_toggle), "calendar").await {
            return false;
        }
        self.step_pause().await;
        if !self.ops.wait_for(&Locator::css(&self.site.calendar_popup), "calendar popup").await {
            return false;
        }
        if !self.ops.click(&Locator::css(&self.site.year_segment), "year segment").await {
            return false;
        }
        self.step_pause().await;

        if !self.select_year(date.year()).await {
            warn!(year = date.year(), "year not selectable");
            return false;
        }
        self.step_pause().await;

        if !self.ops.click(&self.site.month_button_at(date.month()), "month").await {
            return false;
        }
        self.step_pause().await;

        let clicked = self
            .ops
            .evaluate(
                scripts::CLICK_ENABLED_DAY,
                vec![
                    Value::from(self.site.day_buttons.as_str()),
                    Value::from(date.day().to_string()),
                ],
                "day",
            )
            .await;
        if clicked != Some(Value::Bool(true)) {
            info!(%date, "day disabled or missing");
            return false;
        }
        tokio::time::sleep(self.timing.date_applied_pause).await;
        debug!(%date, "date selected");
        true
    }

    async fn select_year(&self, year: i32) -> bool {
        let wanted = year.to_string();
        let by_index = self.site.year_button_at(year - self.site.first_year + 1);
        let text = self.ops.read_text(&by_index, "year by index").await;
        if text.as_deref().map(str::trim) == Some(wanted.as_str()) {
            return self.ops.click(&by_index, "year").await;
        }
        debug!(year, found = ?text, "year grid out of position, scanning by text");
        let clicked = self
            .ops
            .evaluate(
                scripts::CLICK_YEAR_BY_TEXT,
                vec![Value::from(self.site.year_buttons.as_str()), Value::from(wanted)],
                "year by text",
            )
            .await;
        clicked == Some(Value::Bool(true))
    }

    pub async fn sell_atm(&self, leg: Leg) -> bool {
        let selector = match leg {
            Leg::Call => &self.site.atm_call_sell,
            Leg::Put => &self.site.atm_put_sell,
        };
        self.ops.click(&Locator::css(selector), "ATM sell").await
    }

    /// Whether the ATM row currently holds this leg's open position, judged by
    /// the sell button's class list.
    pub async fn atm_leg_active(&self, leg: Leg) -> bool {
        let selector = match leg {
            Leg::Call => &self.site.atm_call_button,
            Leg::Put => &self.site.atm_put_button,
        };
        self.ops
            .read_attribute(&Locator::css(selector), "class", "ATM leg state")
            .await
            .is_some_and(|classes| {
                classes
                    .split_whitespace()
                    .any(|class| class == self.site.active_leg_class)
            })
    }

    /// Last traded price of the row holding this leg's open position.
    pub async fn leg_ltp(&self, leg: Leg) -> Option<Decimal> {
        let selector = match leg {
            Leg::Call => &self.site.call_ltp,
            Leg::Put => &self.site.put_ltp,
        };
        let text = self.ops.read_text(&Locator::css(selector), "LTP").await?;
        parse_number(&text)
    }

    pub async fn clock(&self) -> Option<SimClock> {
        let hour = self
            .ops
            .read_text(&SiteLayout::selected_option(&self.site.clock_hour_select), "hour")
            .await?;
        let minute = self
            .ops
            .read_text(&SiteLayout::selected_option(&self.site.clock_minute_select), "minute")
            .await?;
        Some(SimClock::new(hour.trim().parse().ok()?, minute.trim().parse().ok()?))
    }

    pub async fn set_clock(&self, clock: SimClock) -> bool {
        let hour = Locator::css(&self.site.clock_hour_select);
        let minute = Locator::css(&self.site.clock_minute_select);
        self.ops.select(&hour, &clock.hour.to_string(), "hour").await
            && self.ops.select(&minute, &clock.minute.to_string(), "minute").await
    }

    /// Total PnL in percent, read from whichever of the loss/profit badges is shown.
    pub async fn total_pnl(&self) -> Option<Decimal> {
        let either = Locator::css(format!("{}, {}", self.site.pnl_loss, self.site.pnl_profit));
        if !self.ops.wait_for(&either, "PnL").await {
            return None;
        }
        for selector in [&self.site.pnl_loss, &self.site.pnl_profit] {
            let loc = Locator::css(selector);
            if let Some(text) = self.ops.peek_text(&loc, "PnL").await {
                return parse_number(&text);
            }
        }
        None
    }

    pub async fn margin_estimate(&self) -> Option<String> {
        self.ops
            .read_text(&Locator::css(&self.site.margin_estimate), "margin")
            .await
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    pub async fn exit_leg(&self, slot: u8) -> bool {
        self.ops.click(&self.site.exit_leg_at(slot), "exit leg").await
    }

    pub async fn exit_all(&self) -> bool {
        self.ops.click(&Locator::css(&self.site.exit_all_button), "exit all").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSimulator;
    use rust_decimal_macros::dec;
    use simdrive_core::BusyPolicy;
    use std::sync::Arc;

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("123.45"), Some(dec!(123.45)));
        assert_eq!(parse_number("\"98.1\" 12%"), Some(dec!(98.1)));
        assert_eq!(parse_number("(-1.25%)"), Some(dec!(-1.25)));
        assert_eq!(parse_number("1,234.5"), Some(dec!(1234.5)));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("N/A"), None);
    }

    async fn page_on(fake: &Arc<FakeSimulator>) -> SimulatorPage {
        let site = SiteLayout::default();
        let timing = TimingConfig::immediate();
        fake.open_simulator();
        let ops = SafeOps::new(fake.clone(), &site.busy_indicator, &timing, BusyPolicy::BestEffort);
        SimulatorPage::new(ops, site, timing)
    }

    #[tokio::test]
    async fn test_select_date_and_disabled_day() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let day = CalendarDate::new(2024, 1, 2).unwrap();
        fake.disable_day(day);
        let page = page_on(&fake).await;

        assert!(page.select_date(CalendarDate::new(2024, 1, 3).unwrap()).await);
        assert_eq!(fake.selected_date(), CalendarDate::new(2024, 1, 3));
        assert!(!page.select_date(day).await);
    }

    #[tokio::test]
    async fn test_year_falls_back_to_text_scan() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        fake.shift_year_grid(1);
        let page = page_on(&fake).await;

        let date = CalendarDate::new(2023, 6, 15).unwrap();
        assert!(page.select_date(date).await);
        assert_eq!(fake.selected_date(), Some(date));
    }

    #[tokio::test]
    async fn test_clock_roundtrip_through_selects() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let page = page_on(&fake).await;

        assert!(page.set_clock(SimClock::new(9, 17)).await);
        assert_eq!(page.clock().await, Some(SimClock::new(9, 17)));
    }

    #[tokio::test]
    async fn test_atm_leg_active_follows_sell_button_class() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let page = page_on(&fake).await;
        assert!(page.select_date(CalendarDate::new(2024, 1, 3).unwrap()).await);

        assert!(!page.atm_leg_active(Leg::Call).await);
        assert!(page.sell_atm(Leg::Call).await);
        assert!(page.atm_leg_active(Leg::Call).await);
        assert!(!page.atm_leg_active(Leg::Put).await);
    }
}
