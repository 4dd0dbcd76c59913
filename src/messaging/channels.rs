// Canaux lock-free entre les threads périphériques et la boucle de session

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use crate::sequencer::clock::{ClockTick, TickConsumer, TickProducer};
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

pub fn create_tick_channel(capacity: usize) -> (TickProducer, TickConsumer) {
    let rb = HeapRb::<ClockTick>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::notification::NotificationCategory;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_command_channel() {
        let (mut tx, mut rx) = create_command_channel(2);
        assert!(tx.try_push(Command::Play).is_ok());
        assert!(tx.try_push(Command::Stop).is_ok());
        assert!(tx.try_push(Command::Quit).is_err());

        assert_eq!(rx.try_pop(), Some(Command::Play));
        assert_eq!(rx.try_pop(), Some(Command::Stop));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_notification_channel() {
        let (mut tx, mut rx) = create_notification_channel(4);
        let _ = tx.try_push(Notification::info(NotificationCategory::Session, "ready"));
        let received = rx.try_pop().unwrap();
        assert_eq!(received.message, "ready");
    }
}
