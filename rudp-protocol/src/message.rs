//! Messages and ordered message queues
//!
//! A connection keeps three queues of messages: pending sends, sent history
//! kept for retransmission, and received messages awaiting in-order delivery.
//! Each queue holds ids in strictly ascending order, and a message belongs to
//! exactly one queue at a time.

use crate::sequence::MessageId;
use bytes::Bytes;
use std::collections::VecDeque;

/// One application message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    /// `None` marks a placeholder for a message the peer reported missing
    payload: Option<Bytes>,
    /// Tick at which the message was queued
    tick: u64,
}

impl Message {
    pub fn new(id: MessageId, payload: Bytes, tick: u64) -> Self {
        Message {
            id,
            payload: Some(payload),
            tick,
        }
    }

    /// Placeholder standing in for a message that will never arrive
    pub fn placeholder(id: MessageId) -> Self {
        Message {
            id,
            payload: None,
            tick: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<Bytes> {
        self.payload
    }

    /// Payload length; placeholders have none
    pub fn len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_placeholder(&self) -> bool {
        self.payload.is_none()
    }
}

/// FIFO of messages with strictly ascending ids
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        MessageQueue {
            messages: VecDeque::new(),
        }
    }

    /// Append at the tail
    ///
    /// The id must be greater than every id already queued.
    pub fn push(&mut self, message: Message) {
        debug_assert!(
            self.back().map_or(true, |last| last.id < message.id),
            "message ids must increase"
        );
        self.messages.push_back(message);
    }

    /// Pop the head only if its id is `expected`
    pub fn pop(&mut self, expected: MessageId) -> Option<Message> {
        match self.messages.front() {
            Some(head) if head.id == expected => self.messages.pop_front(),
            _ => None,
        }
    }

    /// Pop the head unconditionally
    pub fn pop_front(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn front(&self) -> Option<&Message> {
        self.messages.front()
    }

    pub fn back(&self) -> Option<&Message> {
        self.messages.back()
    }

    /// Insert keeping ids ascending
    ///
    /// Returns `false` and drops the message if its id is already queued.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.back().map_or(true, |last| last.id < message.id) {
            self.messages.push_back(message);
            return true;
        }

        match self.messages.binary_search_by_key(&message.id, Message::id) {
            Ok(_) => false,
            Err(idx) => {
                self.messages.insert(idx, message);
                true
            }
        }
    }

    /// Drop every message queued before `tick`
    ///
    /// Messages are queued in tick order, so this cuts the queue at the first
    /// message stamped at or after `tick`. Returns how many were dropped.
    pub fn expire_before(&mut self, tick: u64) -> usize {
        let keep_from = self.messages.partition_point(|m| m.tick < tick);
        self.messages.drain(..keep_from);
        keep_from
    }

    /// Move every message of `other` onto the tail of this queue
    pub fn append(&mut self, other: &mut MessageQueue) {
        debug_assert!(match (self.back(), other.front()) {
            (Some(last), Some(first)) => last.id < first.id,
            _ => true,
        });
        self.messages.append(&mut other.messages);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, tick: u64) -> Message {
        Message::new(MessageId::new(id), Bytes::from(vec![id as u8]), tick)
    }

    fn ids(queue: &MessageQueue) -> Vec<i64> {
        queue.iter().map(|m| m.id().as_raw()).collect()
    }

    #[test]
    fn test_pop_requires_expected_id() {
        let mut queue = MessageQueue::new();
        queue.push(msg(3, 0));
        queue.push(msg(4, 0));

        assert!(queue.pop(MessageId::new(2)).is_none());
        assert_eq!(queue.pop(MessageId::new(3)).unwrap().id(), MessageId::new(3));
        assert!(queue.pop(MessageId::new(3)).is_none());
        assert_eq!(queue.pop_front().unwrap().id(), MessageId::new(4));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_insert_keeps_order_and_rejects_duplicates() {
        let mut queue = MessageQueue::new();
        assert!(queue.insert(msg(5, 0)));
        assert!(queue.insert(msg(1, 0)));
        assert!(queue.insert(msg(3, 0)));
        assert!(queue.insert(msg(9, 0)));
        assert!(!queue.insert(msg(3, 0)));
        assert!(!queue.insert(msg(9, 0)));

        assert_eq!(ids(&queue), vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_expire_before_is_strict() {
        let mut queue = MessageQueue::new();
        queue.push(msg(0, 0));
        queue.push(msg(1, 2));
        queue.push(msg(2, 4));
        queue.push(msg(3, 4));

        assert_eq!(queue.expire_before(0), 0);
        assert_eq!(queue.expire_before(4), 2);
        assert_eq!(ids(&queue), vec![2, 3]);
        assert_eq!(queue.expire_before(100), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_append_moves_everything() {
        let mut history = MessageQueue::new();
        history.push(msg(0, 0));
        let mut pending = MessageQueue::new();
        pending.push(msg(1, 1));
        pending.push(msg(2, 1));

        history.append(&mut pending);

        assert!(pending.is_empty());
        assert_eq!(ids(&history), vec![0, 1, 2]);
    }

    #[test]
    fn test_placeholder() {
        let placeholder = Message::placeholder(MessageId::new(7));
        assert!(placeholder.is_placeholder());
        assert!(placeholder.payload().is_none());

        let empty = Message::new(MessageId::new(8), Bytes::new(), 0);
        assert!(!empty.is_placeholder());
        assert!(empty.is_empty());
    }
}
