use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use configuration::{ConfigError, MarketHours};
use serde::Serialize;

/// The exchange's regular session: weekdays, `[open, close)` local time.
/// There is no holiday table.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub next_open: DateTime<Utc>,
    pub message: String,
}

const REGULAR_OPEN: NaiveTime = match NaiveTime::from_hms_opt(9, 30, 0) {
    Some(t) => t,
    None => panic!("09:30 is a valid time"),
};
const REGULAR_CLOSE: NaiveTime = match NaiveTime::from_hms_opt(16, 0, 0) {
    Some(t) => t,
    None => panic!("16:00 is a valid time"),
};

impl Default for MarketCalendar {
    /// NYSE/Nasdaq hours: 09:30 to 16:00 America/New_York.
    fn default() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            open: REGULAR_OPEN,
            close: REGULAR_CLOSE,
        }
    }
}

impl MarketCalendar {
    pub fn new(tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self { tz, open, close }
    }

    pub fn from_config(hours: &MarketHours) -> Result<Self, ConfigError> {
        Ok(Self::new(hours.tz()?, hours.open_time()?, hours.close_time()?))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        let time = local.time();
        is_weekday(local.date_naive()) && time >= self.open && time < self.close
    }

    /// The first session open strictly after `now`.
    pub fn next_open(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let mut date = local.date_naive();
        if local.time() >= self.open {
            date = date + Duration::days(1);
        }

        // A week always contains a weekday whose open exists in local time.
        for _ in 0..14 {
            if is_weekday(date) {
                if let Some(open) = self.tz.from_local_datetime(&date.and_time(self.open)).earliest() {
                    return open.with_timezone(&Utc);
                }
            }
            date = date + Duration::days(1);
        }
        now
    }

    /// Human hint for the next open: "Today", "Tomorrow" or the weekday name,
    /// followed by the local open time, e.g. `Monday 9:30 AM EST`.
    pub fn next_open_hint(&self, now: DateTime<Utc>) -> String {
        let next = self.next_open(now).with_timezone(&self.tz);
        let today = now.with_timezone(&self.tz).date_naive();
        let day = match (next.date_naive() - today).num_days() {
            0 => "Today".to_string(),
            1 => "Tomorrow".to_string(),
            _ => next.format("%A").to_string(),
        };
        format!("{day} {}", next.format("%-I:%M %p %Z"))
    }

    pub fn status(&self, now: DateTime<Utc>) -> MarketStatus {
        let is_open = self.is_open(now);
        let message = if is_open {
            "Market is open".to_string()
        } else {
            format!("Market is closed. Opens {}", self.next_open_hint(now))
        };
        MarketStatus {
            is_open,
            next_open: self.next_open(now),
            message,
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
