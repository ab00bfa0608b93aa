use propsync_core::{MetaKey, RawRecord};

use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::sanitize::{as_int, as_text};

pub const AGENCY_DISPLAY: &str = "agency_info";
pub const AGENT_DISPLAY: &str = "agent_info";

struct ContactKeys {
    email: MetaKey,
    mobile: MetaKey,
    name: MetaKey,
}

const AGENCY_KEYS: ContactKeys = ContactKeys {
    email: MetaKey::AgencyEmail,
    mobile: MetaKey::AgencyMobile,
    name: MetaKey::AgencyName,
};

const AGENT_KEYS: ContactKeys = ContactKeys {
    email: MetaKey::AgentEmail,
    mobile: MetaKey::AgentMobile,
    name: MetaKey::AgentName,
};

/// Contact details, filed under the agency when the contact belongs to one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentMapper;

impl AgentMapper {
    fn text(raw: &RawRecord, field: &str) -> String {
        raw.non_empty(field).map(as_text).unwrap_or_default()
    }

    pub fn contact_name(raw: &RawRecord) -> Option<String> {
        let parts: Vec<String> = ["contactFirstname", "contactLastname"]
            .into_iter()
            .map(|field| Self::text(raw, field))
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

impl FieldMapper for AgentMapper {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let Some(contact) = raw.non_empty("contactId") else {
            return;
        };

        let keys = match ctx.config.agency_for_contact(as_int(contact)) {
            Some(agency_id) => {
                out.set_meta(MetaKey::AgentDisplayOption, AGENCY_DISPLAY);
                out.set_meta(MetaKey::PropertyAgency, agency_id.to_string());
                &AGENCY_KEYS
            }
            None => {
                out.set_meta(MetaKey::AgentDisplayOption, AGENT_DISPLAY);
                &AGENT_KEYS
            }
        };

        let email = Self::text(raw, "contactEmail");
        if !email.is_empty() {
            out.set_meta(keys.email, email);
        }
        let phone = Self::text(raw, "contactPhone");
        if !phone.is_empty() {
            out.set_meta(keys.mobile, phone);
        }
        if let Some(name) = Self::contact_name(raw) {
            out.set_meta(keys.name, name);
        }
    }
}
