use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::types::{ShowStatus, TrackedShow};

/// What the metadata source told us about a show this run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeSignal {
    /// The source lists the show as changed at the given time.
    Changed(DateTime<Utc>),
    /// The source answered and the show is not in its changed list.
    Unchanged,
    /// No answer for this show's source (not configured or failed).
    Unavailable,
}

/// Decides whether a show needs a full update rather than a refresh.
pub trait UpdatePolicy: Send + Sync {
    fn should_update(
        &self,
        show: &TrackedShow,
        today: NaiveDate,
        signal: ChangeSignal,
    ) -> Result<bool>;
}

/// Default policy: remote changes win, otherwise ended shows are only
/// updated near an episode air date.
#[derive(Clone, Copy, Debug)]
pub struct GraceWindowPolicy {
    grace_days: i64,
}

impl GraceWindowPolicy {
    pub fn new(grace_days: i64) -> Self {
        Self {
            grace_days: grace_days.max(0),
        }
    }

    fn within_grace(&self, today: NaiveDate, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|date| (today - date).num_days().abs() <= self.grace_days)
    }
}

impl UpdatePolicy for GraceWindowPolicy {
    fn should_update(
        &self,
        show: &TrackedShow,
        today: NaiveDate,
        signal: ChangeSignal,
    ) -> Result<bool> {
        if let ChangeSignal::Changed(at) = signal
            && at.date_naive() > show.last_update
        {
            return Ok(true);
        }

        let in_grace = self.within_grace(today, show.episodes.last_aired)
            || self.within_grace(today, show.episodes.next_airing);

        Ok(match show.status {
            ShowStatus::Ended => in_grace,
            ShowStatus::Continuing | ShowStatus::Unknown => {
                matches!(signal, ChangeSignal::Unavailable) || in_grace
            }
        })
    }
}
