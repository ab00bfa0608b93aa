use std::collections::HashMap;

use chrono::{FixedOffset, Offset, Utc};

pub const DEFAULT_AGENCY_ID: i64 = 2792;

/// Feed contact ids whose listings belong to the default agency.
pub const DEFAULT_AGENCY_CONTACTS: [i64; 8] = [
    145581, 136583, 147224, 130235, 145584, 80793, 79629, 120476,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Feed contact id -> agency entity id.
    pub agency_contacts: HashMap<i64, i64>,
    /// Offset used to read naive feed timestamps and to derive UTC post dates.
    pub site_offset: FixedOffset,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            agency_contacts: DEFAULT_AGENCY_CONTACTS
                .iter()
                .map(|contact| (*contact, DEFAULT_AGENCY_ID))
                .collect(),
            site_offset: Utc.fix(),
        }
    }
}

impl MapperConfig {
    pub fn agency_for_contact(&self, contact_id: i64) -> Option<i64> {
        self.agency_contacts.get(&contact_id).copied()
    }

    pub fn with_site_offset(mut self, offset: FixedOffset) -> Self {
        self.site_offset = offset;
        self
    }

    pub fn with_agency_contacts(mut self, contacts: HashMap<i64, i64>) -> Self {
        self.agency_contacts = contacts;
        self
    }
}
