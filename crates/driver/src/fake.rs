//! Scriptable in-memory stand-in for the remote simulator.
//!
//! Implements [`RemoteUiDriver`] by matching locators against a
//! [`SiteLayout`], so the real page object and state machine run unchanged
//! against it. Knobs cover the faults the driver must survive.

use crate::scripts;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use simdrive_core::{
    CalendarDate, DriverError, DriverFactory, DriverResult, Locator, RemoteUiDriver, SessionCookie,
    SimClock, SiteLayout,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SESSION_COOKIE: &str = "sid";
const YEAR_GRID_SIZE: i32 = 12;
const MAX_SLOT: u8 = 6;

type PriceFn = Arc<dyn Fn(SimClock) -> (Decimal, Decimal) + Send + Sync>;
type PnlFn = Arc<dyn Fn(SimClock) -> Decimal + Send + Sync>;

/// Counters of what the driver did to the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeStats {
    pub navigations: u32,
    pub reloads: u32,
    pub logins: u32,
    pub cookie_sets: u32,
    pub cookie_clears: u32,
    pub sells: u32,
    pub leg_exits: u32,
    pub exit_all: u32,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Login,
    Simulator,
}

#[derive(Debug, Clone, Copy)]
struct OpenLeg {
    call: bool,
    at_atm: bool,
}

struct State {
    screen: Screen,
    cookies: Vec<SessionCookie>,
    typed_phone: bool,
    typed_password: bool,
    busy: bool,
    connection_lost: bool,
    ready: bool,
    failing: HashMap<String, SimClock>,

    calendar_open: bool,
    year_grid_open: bool,
    year_shift: i32,
    picked_year: Option<i32>,
    picked_month: Option<u32>,
    selected: Option<CalendarDate>,
    disabled: HashSet<CalendarDate>,

    clock: SimClock,
    frozen_from: Option<SimClock>,
    legs: Vec<OpenLeg>,
    atm_shift_at: Option<SimClock>,
    atm_shifted: bool,
    blank_ltp_reads: u32,

    stats: FakeStats,
}

impl State {
    fn reset_simulator(&mut self) {
        self.calendar_open = false;
        self.year_grid_open = false;
        self.picked_year = None;
        self.picked_month = None;
        self.selected = None;
        self.clock = SimClock::new(9, 15);
        self.legs.clear();
        self.atm_shifted = false;
    }

    fn authenticated(&self) -> bool {
        self.cookies.iter().any(|c| c.name == SESSION_COOKIE)
    }

    fn on_simulator(&self) -> bool {
        self.screen == Screen::Simulator
    }

    fn has_leg(&self, call: bool) -> bool {
        self.legs.iter().any(|l| l.call == call)
    }

    fn has_atm_leg(&self, call: bool) -> bool {
        self.legs.iter().any(|l| l.call == call && l.at_atm)
    }
}

pub struct FakeSimulator {
    site: SiteLayout,
    state: Mutex<State>,
    prices: Mutex<PriceFn>,
    pnl: Mutex<PnlFn>,
}

impl FakeSimulator {
    /// A simulator with flat prices (100/100) and zero PnL.
    #[must_use]
    pub fn new(site: SiteLayout) -> Self {
        Self {
            site,
            state: Mutex::new(State {
                screen: Screen::Blank,
                cookies: Vec::new(),
                typed_phone: false,
                typed_password: false,
                busy: false,
                connection_lost: false,
                ready: true,
                failing: HashMap::new(),
                calendar_open: false,
                year_grid_open: false,
                year_shift: 0,
                picked_year: None,
                picked_month: None,
                selected: None,
                disabled: HashSet::new(),
                clock: SimClock::new(9, 15),
                frozen_from: None,
                legs: Vec::new(),
                atm_shift_at: None,
                atm_shifted: false,
                blank_ltp_reads: 0,
                stats: FakeStats::default(),
            }),
            prices: Mutex::new(Arc::new(|_| (Decimal::ONE_HUNDRED, Decimal::ONE_HUNDRED))),
            pnl: Mutex::new(Arc::new(|_| Decimal::ZERO)),
        }
    }

    #[must_use]
    pub fn stats(&self) -> FakeStats {
        self.state.lock().stats.clone()
    }

    #[must_use]
    pub fn selected_date(&self) -> Option<CalendarDate> {
        self.state.lock().selected
    }

    #[must_use]
    pub fn clock(&self) -> SimClock {
        self.state.lock().clock
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.lock().busy = busy;
    }

    pub fn set_connection_lost(&self, lost: bool) {
        self.state.lock().connection_lost = lost;
    }

    /// When false the simulator never shows its ready marker.
    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    /// Every operation on this selector fails with a session error.
    pub fn fail_locator(&self, selector: &str) {
        self.fail_locator_from(selector, SimClock::new(0, 0));
    }

    /// Operations on this selector fail once the simulator clock reaches `at`.
    pub fn fail_locator_from(&self, selector: &str, at: SimClock) {
        self.state.lock().failing.insert(selector.to_string(), at);
    }

    /// From `at` on, clock selections are accepted but have no effect.
    pub fn freeze_clock_at(&self, at: SimClock) {
        self.state.lock().frozen_from = Some(at);
    }

    pub fn disable_day(&self, date: CalendarDate) {
        self.state.lock().disabled.insert(date);
    }

    /// Renders the year grid starting `shift` years later than configured.
    pub fn shift_year_grid(&self, shift: i32) {
        self.state.lock().year_shift = shift;
    }

    /// The next `count` LTP reads come back blank.
    pub fn blank_ltp_reads(&self, count: u32) {
        self.state.lock().blank_ltp_reads = count;
    }

    /// From `at` on, the open legs are no longer at the ATM strike.
    pub fn shift_atm_at(&self, at: SimClock) {
        self.state.lock().atm_shift_at = Some(at);
    }

    /// Call and put LTP as a function of the simulator clock.
    pub fn set_prices(&self, prices: impl Fn(SimClock) -> (Decimal, Decimal) + Send + Sync + 'static) {
        *self.prices.lock() = Arc::new(prices);
    }

    pub fn set_pnl(&self, pnl: impl Fn(SimClock) -> Decimal + Send + Sync + 'static) {
        *self.pnl.lock() = Arc::new(pnl);
    }

    /// Puts the fake on the login form without going through the driver.
    pub fn open_login(&self) {
        let mut state = self.state.lock();
        state.screen = Screen::Login;
    }

    /// Puts the fake on an authenticated simulator page without going through the driver.
    pub fn open_simulator(&self) {
        let mut state = self.state.lock();
        state.cookies = vec![session_cookie()];
        state.screen = Screen::Simulator;
        state.reset_simulator();
    }

    fn prices_at(&self, clock: SimClock) -> (Decimal, Decimal) {
        let prices = self.prices.lock().clone();
        prices(clock)
    }

    fn pnl_at(&self, clock: SimClock) -> Decimal {
        let pnl = self.pnl.lock().clone();
        pnl(clock)
    }

    fn year_index(&self, selector: &str) -> Option<i32> {
        (1..=YEAR_GRID_SIZE).find(|i| self.site.year_button_at(*i).as_str() == selector)
    }

    fn month_index(&self, selector: &str) -> Option<u32> {
        (1..=12).find(|m| self.site.month_button_at(*m).as_str() == selector)
    }

    fn exit_slot(&self, selector: &str) -> Option<u8> {
        (1..=MAX_SLOT).find(|s| self.site.exit_leg_at(*s).as_str() == selector)
    }

    fn rendered_year(&self, state: &State, index: i32) -> i32 {
        self.site.first_year - 1 + index + state.year_shift
    }

    fn check(&self, state: &State, locator: &Locator) -> DriverResult<()> {
        if state.stats.closed {
            return Err(DriverError::Session("session closed".to_string()));
        }
        if state
            .failing
            .get(locator.as_str())
            .is_some_and(|from| state.clock >= *from)
        {
            return Err(DriverError::Session(format!("injected failure on {locator}")));
        }
        Ok(())
    }

    fn present(&self, state: &State, locator: &Locator) -> bool {
        let s = locator.as_str();
        let site = &self.site;
        let sim = state.on_simulator();
        if s == site.busy_indicator {
            state.busy
        } else if s == site.connection_status {
            true
        } else if s == site.phone_input || s == site.password_input || s == site.login_button {
            state.screen == Screen::Login
        } else if s == site.ready_marker {
            sim && state.ready && state.authenticated()
        } else if s == site.calendar_toggle
            || s == site.clock_hour_select
            || s == site.clock_minute_select
            || s == SiteLayout::selected_option(&site.clock_hour_select).as_str()
            || s == SiteLayout::selected_option(&site.clock_minute_select).as_str()
        {
            sim
        } else if s == site.calendar_popup || s == site.year_segment {
            sim && state.calendar_open
        } else if self.year_index(s).is_some() {
            sim && state.calendar_open && state.year_grid_open
        } else if self.month_index(s).is_some() {
            sim && state.calendar_open && state.picked_year.is_some()
        } else if s == site.atm_call_sell || s == site.atm_put_sell {
            sim && state.selected.is_some()
        } else if s == site.atm_call_button || s == site.atm_put_button {
            sim && state.selected.is_some()
        } else if s == site.call_ltp {
            sim && state.has_leg(true)
        } else if s == site.put_ltp {
            sim && state.has_leg(false)
        } else if s == site.pnl_loss {
            sim && !state.legs.is_empty() && self.pnl_at(state.clock) < Decimal::ZERO
        } else if s == site.pnl_profit {
            sim && !state.legs.is_empty() && self.pnl_at(state.clock) >= Decimal::ZERO
        } else if s == format!("{}, {}", site.pnl_loss, site.pnl_profit) {
            sim && !state.legs.is_empty()
        } else if s == site.margin_estimate || s == site.exit_all_button {
            sim && !state.legs.is_empty()
        } else if let Some(slot) = self.exit_slot(s) {
            sim && slot >= 2 && usize::from(slot - 2) < state.legs.len()
        } else {
            false
        }
    }

    fn apply_clock(&self, state: &mut State) {
        if let Some(at) = state.atm_shift_at {
            if !state.atm_shifted && state.clock >= at {
                state.atm_shifted = true;
                for leg in &mut state.legs {
                    leg.at_atm = false;
                }
            }
        }
    }

    fn sell(state: &mut State, call: bool) {
        state.stats.sells += 1;
        if !state.has_atm_leg(call) {
            state.legs.push(OpenLeg { call, at_atm: true });
        }
    }
}

fn session_cookie() -> SessionCookie {
    SessionCookie {
        name: SESSION_COOKIE.to_string(),
        value: "fake-session".to_string(),
        domain: Some("simulator.test".to_string()),
        path: Some("/".to_string()),
        secure: true,
        http_only: true,
    }
}

#[async_trait]
impl RemoteUiDriver for FakeSimulator {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.stats.closed {
            return Err(DriverError::Session("session closed".to_string()));
        }
        state.stats.navigations += 1;
        if url == self.site.login_url {
            state.screen = Screen::Login;
            state.typed_phone = false;
            state.typed_password = false;
        } else if url == self.site.simulator_url {
            state.screen = Screen::Simulator;
            state.reset_simulator();
        } else {
            state.screen = Screen::Blank;
        }
        Ok(())
    }

    async fn reload(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.stats.closed {
            return Err(DriverError::Session("session closed".to_string()));
        }
        state.stats.reloads += 1;
        if state.on_simulator() {
            state.reset_simulator();
        }
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> DriverResult<()> {
        let state = self.state.lock();
        self.check(&state, locator)?;
        if self.present(&state, locator) {
            Ok(())
        } else {
            Err(DriverError::timeout(locator.to_string()))
        }
    }

    async fn is_present(&self, locator: &Locator) -> DriverResult<bool> {
        let state = self.state.lock();
        self.check(&state, locator)?;
        Ok(self.present(&state, locator))
    }

    async fn click(&self, locator: &Locator) -> DriverResult<()> {
        let mut state = self.state.lock();
        self.check(&state, locator)?;
        if !self.present(&state, locator) {
            return Err(DriverError::not_found(locator.to_string()));
        }
        let s = locator.as_str();
        let site = &self.site;
        if s == site.login_button {
            if state.typed_phone && state.typed_password {
                state.stats.logins += 1;
                state.cookies = vec![session_cookie()];
            }
        } else if s == site.calendar_toggle {
            state.calendar_open = true;
        } else if s == site.year_segment {
            state.year_grid_open = true;
        } else if let Some(index) = self.year_index(s) {
            let year = self.rendered_year(&state, index);
            state.picked_year = Some(year);
        } else if let Some(month) = self.month_index(s) {
            state.picked_month = Some(month);
        } else if s == site.atm_call_sell {
            Self::sell(&mut state, true);
        } else if s == site.atm_put_sell {
            Self::sell(&mut state, false);
        } else if let Some(slot) = self.exit_slot(s) {
            state.legs.remove(usize::from(slot - 2));
            state.stats.leg_exits += 1;
        } else if s == site.exit_all_button {
            state.legs.clear();
            state.stats.exit_all += 1;
        }
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, _value: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        self.check(&state, locator)?;
        if !self.present(&state, locator) {
            return Err(DriverError::not_found(locator.to_string()));
        }
        if locator.as_str() == self.site.phone_input {
            state.typed_phone = true;
        } else if locator.as_str() == self.site.password_input {
            state.typed_password = true;
        }
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        self.check(&state, locator)?;
        if !self.present(&state, locator) {
            return Err(DriverError::not_found(locator.to_string()));
        }
        let value: u32 = value
            .parse()
            .map_err(|_| DriverError::Script(format!("no option {value}")))?;
        if state.frozen_from.is_some_and(|at| state.clock >= at) {
            return Ok(());
        }
        if locator.as_str() == self.site.clock_hour_select {
            state.clock.hour = value;
        } else if locator.as_str() == self.site.clock_minute_select {
            state.clock.minute = value;
            self.apply_clock(&mut state);
        }
        Ok(())
    }

    async fn read_text(&self, locator: &Locator) -> DriverResult<String> {
        let mut state = self.state.lock();
        self.check(&state, locator)?;
        if !self.present(&state, locator) {
            return Err(DriverError::not_found(locator.to_string()));
        }
        let s = locator.as_str();
        let site = &self.site;
        let text = if s == site.connection_status {
            if state.connection_lost {
                format!("{}.", site.connection_lost_text)
            } else {
                String::new()
            }
        } else if let Some(index) = self.year_index(s) {
            self.rendered_year(&state, index).to_string()
        } else if s == SiteLayout::selected_option(&site.clock_hour_select).as_str() {
            state.clock.hour.to_string()
        } else if s == SiteLayout::selected_option(&site.clock_minute_select).as_str() {
            format!("{:02}", state.clock.minute)
        } else if s == site.call_ltp || s == site.put_ltp {
            if state.blank_ltp_reads > 0 {
                state.blank_ltp_reads -= 1;
                String::new()
            } else {
                let (call, put) = self.prices_at(state.clock);
                let ltp = if s == site.call_ltp { call } else { put };
                format!("\"{ltp}\" ")
            }
        } else if s == site.pnl_loss || s == site.pnl_profit {
            format!("({}%)", self.pnl_at(state.clock))
        } else if s == site.margin_estimate {
            "1,25,000".to_string()
        } else {
            String::new()
        };
        Ok(text)
    }

    async fn read_attribute(&self, locator: &Locator, name: &str) -> DriverResult<Option<String>> {
        let state = self.state.lock();
        self.check(&state, locator)?;
        if !self.present(&state, locator) {
            return Err(DriverError::not_found(locator.to_string()));
        }
        let s = locator.as_str();
        let site = &self.site;
        if name != "class" || (s != site.atm_call_button && s != site.atm_put_button) {
            return Ok(None);
        }
        let classes = if state.has_atm_leg(s == site.atm_call_button) {
            format!("sell_button {}", site.active_leg_class)
        } else {
            "sell_button".to_string()
        };
        Ok(Some(classes))
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        let mut state = self.state.lock();
        let wanted = args.get(1).and_then(Value::as_str).unwrap_or_default();
        if script == scripts::CLICK_YEAR_BY_TEXT {
            if !(state.calendar_open && state.year_grid_open) {
                return Ok(Value::Bool(false));
            }
            let year = (1..=YEAR_GRID_SIZE)
                .map(|i| self.rendered_year(&state, i))
                .find(|y| y.to_string() == wanted);
            state.picked_year = year.or(state.picked_year);
            return Ok(Value::Bool(year.is_some()));
        }
        if script == scripts::CLICK_ENABLED_DAY {
            let (Some(year), Some(month)) = (state.picked_year, state.picked_month) else {
                return Ok(Value::Bool(false));
            };
            if !state.calendar_open {
                return Ok(Value::Bool(false));
            }
            let date = wanted
                .parse()
                .ok()
                .and_then(|day| CalendarDate::new(year, month, day));
            return match date {
                Some(date) if !state.disabled.contains(&date) => {
                    state.selected = Some(date);
                    state.calendar_open = false;
                    state.year_grid_open = false;
                    Ok(Value::Bool(true))
                }
                _ => Ok(Value::Bool(false)),
            };
        }
        Err(DriverError::Script("unknown script".to_string()))
    }

    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>> {
        Ok(self.state.lock().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.stats.cookie_sets += 1;
        state.cookies = cookies.to_vec();
        Ok(())
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.stats.cookie_clears += 1;
        state.cookies.clear();
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.state.lock().stats.closed = true;
        Ok(())
    }
}

/// Hands out one shared [`FakeSimulator`] and counts how often it was opened.
pub struct FakeFactory {
    simulator: Arc<FakeSimulator>,
    opens: AtomicU32,
    fail: bool,
}

impl FakeFactory {
    #[must_use]
    pub fn new(simulator: Arc<FakeSimulator>) -> Self {
        Self {
            simulator,
            opens: AtomicU32::new(0),
            fail: false,
        }
    }

    /// A factory whose `open` always fails.
    #[must_use]
    pub fn unavailable(simulator: Arc<FakeSimulator>) -> Self {
        Self {
            fail: true,
            ..Self::new(simulator)
        }
    }

    #[must_use]
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn open(&self) -> DriverResult<Arc<dyn RemoteUiDriver>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DriverError::Session("webdriver unreachable".to_string()));
        }
        Ok(self.simulator.clone())
    }
}
