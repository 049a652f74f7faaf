use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::booking::BookingResult;

pub type BookingOutcome = Result<BookingResult, DispatchError>;

#[derive(Debug)]
pub struct BookingHandle {
    booking_id: Uuid,
    region: String,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Pending(oneshot::Receiver<BookingOutcome>),
    Ready(BookingOutcome),
}

impl BookingHandle {
    pub(crate) fn new(
        booking_id: Uuid,
        region: &str,
        receiver: oneshot::Receiver<BookingOutcome>,
    ) -> Self {
        Self {
            booking_id,
            region: region.to_string(),
            state: HandleState::Pending(receiver),
        }
    }

    pub fn booking_id(&self) -> Uuid {
        self.booking_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_finished(&mut self) -> bool {
        let outcome = match &mut self.state {
            HandleState::Ready(_) => return true,
            HandleState::Pending(rx) => match rx.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Closed) => {
                    Err(dropped_before_completion(self.booking_id, &self.region))
                }
            },
        };
        self.state = HandleState::Ready(outcome);
        true
    }

    pub async fn wait(self) -> BookingOutcome {
        match self.state {
            HandleState::Ready(outcome) => outcome,
            HandleState::Pending(rx) => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(dropped_before_completion(self.booking_id, &self.region)),
            },
        }
    }

    /// Blocks the current thread. Must not be called from within an async runtime.
    pub fn blocking_wait(self) -> BookingOutcome {
        match self.state {
            HandleState::Ready(outcome) => outcome,
            HandleState::Pending(rx) => match rx.blocking_recv() {
                Ok(outcome) => outcome,
                Err(_) => Err(dropped_before_completion(self.booking_id, &self.region)),
            },
        }
    }
}

fn dropped_before_completion(booking_id: Uuid, region: &str) -> DispatchError {
    DispatchError::Cancelled(format!(
        "booking {booking_id} in region {region} was dropped before completing"
    ))
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;
    use uuid::Uuid;

    use super::BookingHandle;
    use crate::error::DispatchError;

    #[tokio::test]
    async fn dropped_sender_resolves_to_cancelled() {
        let (tx, rx) = oneshot::channel();
        let mut handle = BookingHandle::new(Uuid::new_v4(), "North", rx);
        assert!(!handle.is_finished());

        drop(tx);
        assert!(handle.is_finished());
        assert!(matches!(
            handle.wait().await,
            Err(DispatchError::Cancelled(_))
        ));
    }

    #[tokio::test]
    async fn polled_outcome_is_kept_for_wait() {
        let (tx, rx) = oneshot::channel();
        let mut handle = BookingHandle::new(Uuid::new_v4(), "South", rx);

        tx.send(Err(DispatchError::Internal("boom".to_string())))
            .unwrap();
        assert!(handle.is_finished());
        assert!(handle.is_finished());
        assert_eq!(
            handle.wait().await.unwrap_err(),
            DispatchError::Internal("boom".to_string())
        );
    }
}
