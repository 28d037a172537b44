use crate::traits::Locator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub webdriver: WebDriverConfig,
    pub site: SiteLayout,
    pub timing: TimingConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the front-end page; served at `/` when present.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium).
    pub url: String,
    pub headless: bool,
    pub browser_args: Vec<String>,
    pub user_agent: Option<String>,
    /// Explicit browser binary, if the driver cannot find one.
    pub browser_binary: Option<String>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            headless: true,
            browser_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-accelerated-video-decode".to_string(),
                "--disable-gpu".to_string(),
                "--window-size=1920,1080".to_string(),
            ],
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/114.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            browser_binary: None,
        }
    }
}

/// URLs and CSS selectors of the remote simulator.
///
/// Templates use `{index}`, `{month}` and `{slot}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteLayout {
    pub login_url: String,
    pub simulator_url: String,

    pub busy_indicator: String,
    pub connection_status: String,
    pub connection_lost_text: String,

    pub phone_input: String,
    pub password_input: String,
    pub login_button: String,

    pub ready_marker: String,

    pub calendar_toggle: String,
    pub calendar_popup: String,
    pub year_segment: String,
    pub year_button: String,
    pub year_buttons: String,
    /// Year rendered first in the picker's year grid.
    pub first_year: i32,
    pub month_button: String,
    pub day_buttons: String,

    pub clock_hour_select: String,
    pub clock_minute_select: String,

    pub pnl_loss: String,
    pub pnl_profit: String,
    pub margin_estimate: String,

    /// Any sell button of the ATM row, open or not; its class list tells
    /// whether the leg is held.
    pub atm_call_button: String,
    pub atm_put_button: String,
    pub active_leg_class: String,
    pub atm_call_sell: String,
    pub atm_put_sell: String,
    pub call_ltp: String,
    pub put_ltp: String,

    pub exit_leg_button: String,
    pub exit_all_button: String,
}

const SIM_CONFIG_BOX: &str =
    "#root > div.__page.simulator_page > div > div > div.simulator__config__box.__no__print > div > div > div.col.time_box";
const SIM_RESULT_BOX: &str =
    "#root > div.__page.simulator_page > div > div > div.simulator__result__box > div.row.simulator_content";
const LOGIN_FORM: &str =
    "#root > div.__page.dashboard > div > div:nth-child(1) > div:nth-child(2) > form";
const CHAIN_ROWS: &str = "#optionChainTable > div > table > tr";

impl Default for SiteLayout {
    fn default() -> Self {
        let picker = format!("{SIM_CONFIG_BOX} > div.time_interval.mx-1 > div");
        let stats = format!(
            "{SIM_RESULT_BOX} > div.simulator_box.simulator_result_box > div > div.eod__message.row.simulator__stats > div:nth-child(2)"
        );
        Self {
            login_url: "https://www.stockmock.in/#!/login".to_string(),
            simulator_url: "https://www.stockmock.in/#!/simulator".to_string(),

            busy_indicator: "#root > div.__loader__container".to_string(),
            connection_status: "#desc".to_string(),
            connection_lost_text: "Please check your internet connection".to_string(),

            phone_input: "#user-phone-no".to_string(),
            password_input: format!("{LOGIN_FORM} > div:nth-child(4) > div > input"),
            login_button: format!("{LOGIN_FORM} > div.__button__control > button"),

            ready_marker: format!(
                "{SIM_RESULT_BOX} > div.simulator_box.simulator_result_box > div > div.pre_build_strategy > div.row.pre_build_strategy_box_container > div:nth-child(1) > div"
            ),

            calendar_toggle: picker.clone(),
            calendar_popup: "div.editor.active".to_string(),
            year_segment: "div.editor.active div.header button:nth-child(6)".to_string(),
            year_button: format!(
                "{picker} > div > div > div.editor.active > div.sled.p2 > div:nth-child(3) > div > button:nth-child({{index}}) > div"
            ),
            year_buttons: "div.editor.active .sled.p2 div:nth-child(3) > button > div".to_string(),
            first_year: 2017,
            month_button: format!(
                "{picker} > div > div > div.editor.active > div.sled.p1 > div:nth-child(2) > div > button:nth-child({{month}})"
            ),
            day_buttons: ".editor.active .sled.p0 button.day".to_string(),

            clock_hour_select: format!(
                "{SIM_CONFIG_BOX} > div.time_interval.mx-1 > select.__box__input.mr-1"
            ),
            clock_minute_select: format!("{SIM_CONFIG_BOX} > div.time_interval.mx-1 > select:nth-child(3)"),

            pnl_loss: format!("{stats} > div.simulator_red_text > span.expiry_indicator"),
            pnl_profit: format!("{stats} > div.simulator_green_text > span.expiry_indicator"),
            margin_estimate: format!("{stats} > div.margin_text > span"),

            atm_call_button: format!("{CHAIN_ROWS}.highlight_atm > td:first-child button.sell_button"),
            atm_put_button: format!("{CHAIN_ROWS}.highlight_atm > td:last-child button.sell_button"),
            active_leg_class: "highlight_action_button".to_string(),
            atm_call_sell: format!("{CHAIN_ROWS}.highlight_atm > td:first-child > div > button.sell_button"),
            atm_put_sell: format!("{CHAIN_ROWS}.highlight_atm > td:last-child > div > button.sell_button"),
            call_ltp: format!(
                "{CHAIN_ROWS}:has(> td:first-child button.sell_button.highlight_action_button) > td.call_ltp"
            ),
            put_ltp: format!(
                "{CHAIN_ROWS}:has(> td:last-child button.sell_button.highlight_action_button) > td.put_ltp"
            ),

            exit_leg_button: format!(
                "{SIM_RESULT_BOX} div.simulator_position_box table > tr:nth-child({{slot}}) button.exit_button"
            ),
            exit_all_button: format!("{SIM_RESULT_BOX} div.simulator_position_box button.exit_all_button"),
        }
    }
}

impl SiteLayout {
    #[must_use]
    pub fn year_button_at(&self, index: i32) -> Locator {
        Locator::css(self.year_button.replace("{index}", &index.to_string()))
    }

    #[must_use]
    pub fn month_button_at(&self, month: u32) -> Locator {
        Locator::css(self.month_button.replace("{month}", &month.to_string()))
    }

    #[must_use]
    pub fn exit_leg_at(&self, slot: u8) -> Locator {
        Locator::css(self.exit_leg_button.replace("{slot}", &slot.to_string()))
    }

    /// The currently selected `<option>` of a `<select>`.
    #[must_use]
    pub fn selected_option(select: &str) -> Locator {
        Locator::css(format!("{select} option:checked"))
    }
}

/// Pauses, waits and cadences used while driving the remote UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after every full navigation.
    #[serde(with = "humantime_serde")]
    pub page_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub post_login_pause: Duration,
    #[serde(with = "humantime_serde")]
    pub login_retry_backoff: Duration,
    /// Pause between date-picker clicks.
    #[serde(with = "humantime_serde")]
    pub picker_step_pause: Duration,
    /// Pause after the day is clicked while the page reloads its data.
    #[serde(with = "humantime_serde")]
    pub date_applied_pause: Duration,
    #[serde(with = "humantime_serde")]
    pub ready_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub find_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub busy_poll: Duration,
    #[serde(with = "humantime_serde")]
    pub monitor_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stuck_threshold: Duration,
    /// How long monitors stay quiet around a self-induced reload.
    #[serde(with = "humantime_serde")]
    pub reload_pause_window: Duration,
    #[serde(with = "humantime_serde")]
    pub date_cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub teardown_pause: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_settle: Duration::from_secs(5),
            post_login_pause: Duration::from_secs(5),
            login_retry_backoff: Duration::from_secs(2),
            picker_step_pause: Duration::from_secs(1),
            date_applied_pause: Duration::from_secs(3),
            ready_timeout: Duration::from_secs(20),
            find_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(30),
            busy_poll: Duration::from_millis(250),
            monitor_interval: Duration::from_secs(2),
            stuck_threshold: Duration::from_secs(30),
            reload_pause_window: Duration::from_secs(30),
            date_cooldown: Duration::from_secs(5),
            teardown_pause: Duration::from_secs(3),
        }
    }
}

impl TimingConfig {
    /// Zero pauses and short waits; used by tests against in-memory pages.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            page_settle: Duration::ZERO,
            post_login_pause: Duration::ZERO,
            login_retry_backoff: Duration::ZERO,
            picker_step_pause: Duration::ZERO,
            date_applied_pause: Duration::ZERO,
            ready_timeout: Duration::from_millis(50),
            find_timeout: Duration::from_millis(50),
            busy_timeout: Duration::from_millis(50),
            busy_poll: Duration::from_millis(10),
            monitor_interval: Duration::from_secs(2),
            stuck_threshold: Duration::from_secs(30),
            reload_pause_window: Duration::from_secs(30),
            date_cooldown: Duration::ZERO,
            teardown_pause: Duration::ZERO,
        }
    }
}

/// What to do when the busy indicator does not clear before an interaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Log and attempt the interaction anyway.
    #[default]
    BestEffort,
    /// Treat the interaction as failed without attempting it.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Full login attempts before the session is reported as failed.
    pub login_max_attempts: u32,
    /// Whole-date attempts (first run plus restarts) before the date fails.
    pub max_date_attempts: u32,
    pub busy_policy: BusyPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            login_max_attempts: 10,
            max_date_attempts: 5,
            busy_policy: BusyPolicy::BestEffort,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: PathBuf::from("cookies.json"),
        }
    }
}
