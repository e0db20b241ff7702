use thiserror::Error;

/// Outbound notifications. Delivery itself is an external concern; this
/// transport records the dispatch through tracing so the surrounding
/// control flow (best-effort vs. rollback-on-failure) is real either way.
#[derive(Clone, Debug)]
pub enum Notification {
    Welcome {
        email: String,
        first_name: String,
    },
    OrderConfirmation {
        email: String,
        first_name: String,
        order_number: String,
        total_amount: f32,
    },
    OrderStatusChange {
        email: String,
        order_number: String,
        previous: String,
        next: String,
    },
    PrescriptionReviewed {
        email: String,
        status: String,
    },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Default)]
pub struct Notifier;

impl Notifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous dispatch. Callers that must not outlive a failed
    /// notification (registration) check the result before committing.
    pub fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Welcome { email, first_name } => {
                tracing::info!(email = %email, first_name = %first_name, "sent welcome notification");
            }
            Notification::OrderConfirmation {
                email,
                order_number,
                total_amount,
                ..
            } => {
                tracing::info!(
                    email = %email,
                    order_number = %order_number,
                    total_amount = %total_amount,
                    "sent order confirmation"
                );
            }
            Notification::OrderStatusChange {
                email,
                order_number,
                previous,
                next,
            } => {
                tracing::info!(
                    email = %email,
                    order_number = %order_number,
                    previous = %previous,
                    next = %next,
                    "sent order status update"
                );
            }
            Notification::PrescriptionReviewed { email, status } => {
                tracing::info!(email = %email, status = %status, "sent prescription review result");
            }
        }
        Ok(())
    }

    /// Fire-and-forget dispatch. Failure is logged, never propagated to the
    /// operation that triggered it.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.send(&notification) {
                tracing::warn!(error = %err, "notification dispatch failed");
            }
        });
    }
}
