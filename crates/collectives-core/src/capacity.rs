//! Slot accounting for an event

use crate::domain::{Event, Registration};

/// Slot counts derived from an event and its current registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub effective_slots: i64,
    pub online_slots: i64,
    pub holding: i64,
    pub waiting: i64,
    pub num_waiting_list: i64,
}

impl Capacity {
    pub fn compute<'a>(event: &Event, registrations: impl IntoIterator<Item = &'a Registration>) -> Self {
        let (mut holding, mut waiting) = (0i64, 0i64);
        for reg in registrations.into_iter().filter(|r| r.event_id == event.id) {
            if reg.status.is_holding_slot() {
                holding += 1;
            } else if reg.status.is_waiting() {
                waiting += 1;
            }
        }

        let leaders = if event.include_leaders_in_counts { event.leaders.len() as i64 } else { 0 };
        let effective_slots = i64::from(event.num_slots) + leaders;
        Self {
            effective_slots,
            online_slots: i64::from(event.num_online_slots).min(effective_slots),
            holding,
            waiting,
            num_waiting_list: i64::from(event.num_waiting_list),
        }
    }

    /// Slots available to leader admission.
    pub fn free_slots(&self) -> i64 {
        self.effective_slots - self.holding
    }

    /// Slots available to self-registration and promotion.
    pub fn free_online(&self) -> i64 {
        (self.online_slots - self.holding).max(0)
    }

    pub fn free_waiting(&self) -> i64 {
        self.num_waiting_list - self.waiting
    }
}
