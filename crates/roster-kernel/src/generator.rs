//! Day generator.
//!
//! Fills each resource's day with randomly sized, gap-free events. Seeded with
//! ChaCha8 so a given seed always lays out the same day.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schedule::{Event, Resource, Schedule};

/// Longest span a single generated layout may cover, in hours (one week).
pub const MAX_SPAN_HOURS: u32 = 24 * 7;

/// Configuration for laying out a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayGeneratorConfig {
    /// Calendar day the events are placed on.
    pub date: NaiveDate,
    /// First hour covered (inclusive).
    pub start_hour: u32,
    /// Last hour covered (exclusive). 24 ends at the next midnight.
    pub end_hour: u32,
    /// Shortest event, in hours.
    pub min_duration: u32,
    /// Longest event, in hours.
    pub max_duration: u32,
}

impl Default for DayGeneratorConfig {
    fn default() -> Self {
        Self {
            date: NaiveDate::from_ymd_opt(2025, 8, 18).unwrap_or_default(),
            start_hour: 0,
            end_hour: 24,
            min_duration: 1,
            max_duration: 3,
        }
    }
}

/// Generator for event layouts.
pub struct DayGenerator {
    config: DayGeneratorConfig,
    rng: ChaCha8Rng,
}

impl DayGenerator {
    /// Create a new generator with the given config and seed.
    pub fn new(config: DayGeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &DayGeneratorConfig {
        &self.config
    }

    /// `hour` hours after midnight of the configured date, if representable.
    fn hour(&self, hour: u32) -> Option<NaiveDateTime> {
        self.config
            .date
            .and_time(chrono::NaiveTime::MIN)
            .checked_add_signed(Duration::hours(i64::from(hour)))
    }

    /// Fill `[start_hour, end_hour)` on one resource.
    ///
    /// Each event lasts between `min_duration` and `min(max_duration,
    /// remaining)` hours; when fewer than `min_duration` hours remain the last
    /// event takes whatever is left. Spans longer than [`MAX_SPAN_HOURS`] are
    /// cut short, and generation stops at the end of the calendar.
    pub fn generate_day(
        &mut self,
        resource_id: &str,
        start_hour: u32,
        end_hour: u32,
        min_duration: u32,
        max_duration: u32,
    ) -> Vec<Event> {
        let min_duration = min_duration.max(1);
        let max_duration = max_duration.max(min_duration);

        let limit = start_hour.saturating_add(MAX_SPAN_HOURS);
        let end_hour = if end_hour > limit {
            warn!(resource = resource_id, end_hour, limit, "Generated span too long, truncated");
            limit
        } else {
            end_hour
        };

        let mut events = Vec::new();
        let mut current = start_hour;
        let mut seq = 1;

        while current < end_hour {
            let remaining = end_hour - current;
            let max_possible = max_duration.min(remaining);
            let duration = if max_possible <= min_duration {
                max_possible
            } else {
                self.rng.random_range(min_duration..=max_possible)
            };

            let (Some(start), Some(end)) = (self.hour(current), self.hour(current + duration)) else {
                warn!(resource = resource_id, hour = current, "Generated event out of calendar range");
                break;
            };
            events.push(Event::new(
                format!("{}_e{}", resource_id, seq),
                resource_id,
                start,
                end,
            ));

            seq += 1;
            current += duration;
        }

        events
    }

    /// Lay out the configured day for every resource in the catalogue.
    pub fn generate_catalogue(&mut self, resources: Vec<Resource>) -> Schedule {
        let DayGeneratorConfig {
            start_hour,
            end_hour,
            min_duration,
            max_duration,
            ..
        } = self.config;

        let events = resources
            .iter()
            .flat_map(|r| {
                self.generate_day(&r.id, start_hour, end_hour, min_duration, max_duration)
            })
            .collect();

        Schedule::new(resources, events)
    }
}
