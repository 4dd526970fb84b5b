//! Builders for creating test data programmatically.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use labeltrack::store::{OrderInfo, Priority, TechnicalRecord};
use labeltrack::{LayoutSnapshot, NewJob, TransitionContext};

/// Transition context `minute` minutes after the start of a morning shift.
pub fn at(minute: i64) -> TransitionContext {
    TransitionContext::new("ana", shift_start() + Duration::minutes(minute))
}

pub fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

/// Builder for creating `NewJob` instances.
pub struct JobBuilder {
    job: NewJob,
}

impl JobBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            job: NewJob {
                customer: "Viña Santa Rita".to_string(),
                name: name.to_string(),
                priority: Priority::Normal,
                order: OrderInfo {
                    quantity: 10_000,
                    ..Default::default()
                },
                technical: TechnicalRecord::default(),
            },
        }
    }

    pub fn customer(mut self, customer: &str) -> Self {
        self.job.customer = customer.to_string();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn order_number(mut self, number: &str) -> Self {
        self.job.order.order_number = Some(number.to_string());
        self
    }

    pub fn due(mut self, year: i32, month: u32, day: u32) -> Self {
        self.job.order.due_date = NaiveDate::from_ymd_opt(year, month, day);
        self
    }

    pub fn material(mut self, material: &str) -> Self {
        self.job.technical.material = Some(material.to_string());
        self
    }

    pub fn layout(mut self, snapshot: LayoutSnapshot) -> Self {
        self.job.technical.layout = Some(snapshot);
        self
    }

    pub fn build(self) -> NewJob {
        self.job
    }
}
