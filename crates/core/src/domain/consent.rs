use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::{ContactId, OrganizationId};

/// Stored opt-in/opt-out/DNC/rate-tracking state for one contact within one
/// organization. Mutated only by the compliance write paths; destroyed only by
/// the external data-retention policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub consent_given: bool,
    pub consent_at: Option<DateTime<Utc>>,
    pub opted_out: bool,
    pub opted_out_at: Option<DateTime<Utc>>,
    pub opt_out_reason: Option<String>,
    pub on_dnc: bool,
    pub messages_sent_today: u32,
    /// Recipient-local date the counter last advanced on.
    pub last_message_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl ConsentRecord {
    pub fn new(contact_id: ContactId, organization_id: OrganizationId) -> Self {
        Self {
            contact_id,
            organization_id,
            consent_given: false,
            consent_at: None,
            opted_out: false,
            opted_out_at: None,
            opt_out_reason: None,
            on_dnc: false,
            messages_sent_today: 0,
            last_message_date: None,
            updated_at: Utc::now(),
        }
    }

    /// Today's effective send count. The counter resets lazily: any stored
    /// value from a previous local day reads as zero.
    pub fn effective_sent_today(&self, today_local: NaiveDate) -> u32 {
        if self.last_message_date == Some(today_local) {
            self.messages_sent_today
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::ConsentRecord;
    use crate::domain::contact::{ContactId, OrganizationId};

    #[test]
    fn counter_reads_zero_on_a_new_local_day() {
        let mut record =
            ConsentRecord::new(ContactId("c-1".to_string()), OrganizationId("org-1".to_string()));
        record.messages_sent_today = 12;
        record.last_message_date = NaiveDate::from_ymd_opt(2026, 3, 4);

        let same_day = NaiveDate::from_ymd_opt(2026, 3, 4).expect("valid date");
        let next_day = NaiveDate::from_ymd_opt(2026, 3, 5).expect("valid date");

        assert_eq!(record.effective_sent_today(same_day), 12);
        assert_eq!(record.effective_sent_today(next_day), 0);
    }

    #[test]
    fn fresh_record_has_no_sends_on_any_day() {
        let record =
            ConsentRecord::new(ContactId("c-2".to_string()), OrganizationId("org-1".to_string()));
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        assert_eq!(record.effective_sent_today(day), 0);
    }
}
