use async_trait::async_trait;

use cadence_core::collaborators::{DeliveryReceipt, MessageDelivery, SendInstruction};
use cadence_core::domain::ContactId;

/// Stand-in transport: accepts every instruction and logs it. A deployment
/// wires the real channel in behind the same trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDelivery;

#[async_trait]
impl MessageDelivery for NoopDelivery {
    async fn send(&self, contact: &ContactId, instruction: SendInstruction) -> DeliveryReceipt {
        tracing::info!(
            event_name = "delivery.noop_send",
            contact_id = %contact.0,
            trigger = %instruction.trigger,
            channel = %instruction.channel,
            "noop transport accepted a message instruction"
        );
        DeliveryReceipt::ok()
    }
}
