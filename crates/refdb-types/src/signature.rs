use std::fmt;

use chrono::{FixedOffset, Local, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A point in time with the UTC offset it was recorded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Time {
    /// Seconds since the UNIX epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes.
    pub offset_minutes: i32,
}

impl Time {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// The current local time.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// Render as RFC 3339 in the recorded offset.
    pub fn to_rfc3339(&self) -> String {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or(Utc.fix());
        match Utc.timestamp_opt(self.seconds, 0).single() {
            Some(utc) => utc.with_timezone(&offset).to_rfc3339(),
            None => format!("@{}", self.seconds),
        }
    }
}

/// Who made a change and when.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: Time,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: Time) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// A signature stamped with the current time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Time::now())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.when.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.when.offset_minutes.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.when.seconds,
            sign,
            abs / 60,
            abs % 60
        )
    }
}
