use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{self, Read, Write};

use crate::codec;
use crate::error::{DecodeError, SimError};
use crate::scheduling::event::{EventDecoder, SimEvent, TraceLoadEvent, NON_PERSISTENT};
use crate::Timestamp;

/// Maximum number of trace records loaded in one batch.
const LOAD_BATCH_SIZE: usize = 100_000;

/// A time/priority-ordered multiset of simulation events.
///
/// Events with identical `(timestamp, priority)` pop in insertion order.
#[derive(Default)]
pub struct EventQueue {
    events: BTreeMap<(Timestamp, i32), VecDeque<Box<dyn SimEvent>>>,
    len: usize,
    decoders: HashMap<u8, EventDecoder>,
}

impl EventQueue {
    /// Creates an empty queue with no loadable event types.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the event types recognized when loading a trace,
    /// replacing any previous registration.
    pub fn set_loadable_events(&mut self, decoders: &[(u8, EventDecoder)]) -> Result<(), SimError> {
        self.decoders.clear();
        for &(code, decoder) in decoders {
            if self.decoders.insert(code, decoder).is_some() {
                return Err(SimError::DuplicateTypeCode(code));
            }
        }
        Ok(())
    }

    /// Enqueues an event.
    pub fn add_event(&mut self, event: Box<dyn SimEvent>) {
        let key = (event.timestamp(), event.priority());
        self.events.entry(key).or_default().push_back(event);
        self.len += 1;
    }

    /// Removes and returns the globally minimal event.
    pub fn pop(&mut self) -> Option<Box<dyn SimEvent>> {
        let mut entry = self.events.first_entry()?;
        let event = entry.get_mut().pop_front()?;
        if entry.get().is_empty() {
            entry.remove();
        }
        self.len -= 1;
        Some(event)
    }

    /// Merges every event of another queue into this one.
    pub fn add_queue(&mut self, other: EventQueue) {
        for (_, bucket) in other.events {
            for event in bucket {
                self.add_event(event);
            }
        }
    }

    /// Discards all events.
    pub fn clear(&mut self) {
        self.events.clear();
        self.len = 0;
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Timestamp of the next event to pop, if any.
    pub fn next_event_time(&self) -> Option<Timestamp> {
        self.events.keys().next().map(|&(timestamp, _)| timestamp)
    }

    /// Writes every persistent event, in execution order.
    pub fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for bucket in self.events.values() {
            for event in bucket {
                if event.type_code() != NON_PERSISTENT {
                    event.save_to(out)?;
                }
            }
        }
        Ok(())
    }

    /// Reads up to a bounded batch of trace records, dispatching through
    /// the registered decoders, and enqueues the decoded events.
    ///
    /// When the batch fills without exhausting the stream, a reload
    /// sentinel timestamped at the last loaded record is enqueued; popping
    /// it resumes loading. End of stream at a record boundary ends loading
    /// normally. Returns the number of records read.
    pub fn load_some(&mut self, mut input: Box<dyn Read>) -> Result<usize, DecodeError> {
        let mut last_timestamp = None;
        for loaded in 0..LOAD_BATCH_SIZE {
            let code = match codec::read_record_tag(&mut *input)? {
                Some(code) => code,
                None => return Ok(loaded),
            };
            let decoder = *self
                .decoders
                .get(&code)
                .ok_or(DecodeError::UnknownEventType(code))?;
            let timestamp = codec::read_i64(&mut *input)?;
            let event = decoder(timestamp, &mut *input)?;
            self.add_event(event);
            last_timestamp = Some(timestamp);
        }
        if let Some(timestamp) = last_timestamp {
            self.add_event(Box::new(TraceLoadEvent::new(timestamp, input)));
        }
        Ok(LOAD_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::simulation::Simulation;

    /// Records its label into a shared log when executed.
    struct TestEvent {
        timestamp: Timestamp,
        priority: i32,
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl SimEvent for TestEvent {
        fn timestamp(&self) -> Timestamp {
            self.timestamp
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn type_code(&self) -> u8 {
            NON_PERSISTENT
        }

        fn save_to(&self, _out: &mut dyn Write) -> io::Result<()> {
            Ok(())
        }

        fn execute(self: Box<Self>, _sim: &mut Simulation) -> Result<(), SimError> {
            self.log.borrow_mut().push(self.label);
            Ok(())
        }
    }

    fn event(
        timestamp: Timestamp,
        priority: i32,
        label: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Box<dyn SimEvent> {
        Box::new(TestEvent {
            timestamp,
            priority,
            label,
            log: log.clone(),
        })
    }

    fn drain(mut queue: EventQueue) {
        let mut sim = Simulation::new();
        while let Some(event) = queue.pop() {
            event.execute(&mut sim).unwrap();
        }
    }

    #[test]
    fn pop_orders_by_time_then_priority() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = EventQueue::new();
        queue.add_event(event(5, 2, "A", &log));
        queue.add_event(event(3, 1, "B", &log));
        queue.add_event(event(5, 1, "C", &log));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.next_event_time(), Some(3));

        drain(queue);
        assert_eq!(*log.borrow(), vec!["B", "C", "A"]);
    }

    #[test]
    fn exact_ties_pop_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = EventQueue::new();
        for label in ["first", "second", "third", "fourth"] {
            queue.add_event(event(1000, 20, label, &log));
        }
        drain(queue);
        assert_eq!(*log.borrow(), vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn add_queue_merges_and_preserves_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = EventQueue::new();
        a.add_event(event(10, 1, "a", &log));
        a.add_event(event(30, 1, "c", &log));

        let mut b = EventQueue::new();
        b.add_event(event(20, 1, "b", &log));
        b.add_event(event(10, 0, "z", &log));

        a.add_queue(b);
        assert_eq!(a.len(), 4);
        drain(a);
        assert_eq!(*log.borrow(), vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn clear_empties_the_queue() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = EventQueue::new();
        queue.add_event(event(1, 1, "a", &log));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.next_event_time(), None);
        assert!(queue.pop().is_none());
    }
}
