// ============================================================================
// Collectives Core - Registration Entity
// File: crates/collectives-core/src/domain/registration.rs
// Description: A user's place on an event and its lifecycle states
// ============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    SelfRegistered,
    ActiveByLeader,
    WaitingList,
    Rejected,
    SelfUnregistered,
    JustifiedAbsentee,
    #[serde(rename = "unjustified_absentee")]
    UnJustifiedAbsentee,
    LateSelfUnregistered,
    PaymentPending,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 9] = [
        RegistrationStatus::SelfRegistered,
        RegistrationStatus::ActiveByLeader,
        RegistrationStatus::WaitingList,
        RegistrationStatus::Rejected,
        RegistrationStatus::SelfUnregistered,
        RegistrationStatus::JustifiedAbsentee,
        RegistrationStatus::UnJustifiedAbsentee,
        RegistrationStatus::LateSelfUnregistered,
        RegistrationStatus::PaymentPending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::SelfRegistered => "self_registered",
            RegistrationStatus::ActiveByLeader => "active_by_leader",
            RegistrationStatus::WaitingList => "waiting_list",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::SelfUnregistered => "self_unregistered",
            RegistrationStatus::JustifiedAbsentee => "justified_absentee",
            RegistrationStatus::UnJustifiedAbsentee => "unjustified_absentee",
            RegistrationStatus::LateSelfUnregistered => "late_self_unregistered",
            RegistrationStatus::PaymentPending => "payment_pending",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Statuses consuming a slot.
    pub fn is_holding_slot(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::SelfRegistered
                | RegistrationStatus::ActiveByLeader
                | RegistrationStatus::PaymentPending
        )
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, RegistrationStatus::WaitingList)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_holding_slot() && !self.is_waiting()
    }

    pub fn is_absentee(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::JustifiedAbsentee | RegistrationStatus::UnJustifiedAbsentee
        )
    }

    /// Allowed edges of the registration state machine.
    pub fn can_transition_to(&self, to: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        match (self, to) {
            (
                SelfRegistered | ActiveByLeader | PaymentPending,
                Rejected
                | SelfUnregistered
                | LateSelfUnregistered
                | JustifiedAbsentee
                | UnJustifiedAbsentee,
            ) => true,
            (PaymentPending, SelfRegistered | ActiveByLeader) => true,
            (
                WaitingList,
                SelfRegistered | PaymentPending | ActiveByLeader | Rejected | SelfUnregistered,
            ) => true,
            // Reclassification after the event
            (JustifiedAbsentee, UnJustifiedAbsentee) | (UnJustifiedAbsentee, JustifiedAbsentee) => {
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationLevel {
    #[default]
    Normal,
    CoLeader,
}

impl RegistrationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationLevel::Normal => "normal",
            RegistrationLevel::CoLeader => "co_leader",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(RegistrationLevel::Normal),
            "co_leader" => Some(RegistrationLevel::CoLeader),
            _ => None,
        }
    }
}

/// Outcome recorded by a leader when closing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Absence {
    Justified,
    Unjustified,
}

impl Absence {
    pub fn status(&self) -> RegistrationStatus {
        match self {
            Absence::Justified => RegistrationStatus::JustifiedAbsentee,
            Absence::Unjustified => RegistrationStatus::UnJustifiedAbsentee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: RegistrationStatus,
    pub level: RegistrationLevel,
    pub is_self: bool,
    pub registration_time: NaiveDateTime,
}

impl Registration {
    pub fn new(
        user_id: Uuid,
        event_id: Uuid,
        status: RegistrationStatus,
        is_self: bool,
        registration_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: collectives_shared::new_id(),
            user_id,
            event_id,
            status,
            level: RegistrationLevel::Normal,
            is_self,
            registration_time,
        }
    }

    /// Moves to `to`, refusing edges the state machine does not have.
    pub fn transition(&mut self, to: RegistrationStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidState(format!(
                "registration cannot go from {} to {}",
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }

    /// Waiting-list order: registration time, then id.
    pub fn queue_key(&self) -> (NaiveDateTime, Uuid) {
        (self.registration_time, self.id)
    }
}
