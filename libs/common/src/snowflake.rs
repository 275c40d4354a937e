use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2024-01-01T00:00:00Z in milliseconds since Unix epoch.
const RELAY_EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

struct Clock {
    last_ms: u64,
    sequence: u64,
}

/// 64-bit snowflake ID generator for message rows.
///
/// Bit layout, most significant first: 42 bits of milliseconds since the
/// relay epoch, 10 bits of worker ID, 12 bits of per-millisecond sequence.
/// IDs minted by one generator are strictly increasing, so sorting by ID
/// equals insertion order.
pub struct SnowflakeGenerator {
    worker_id: u64,
    clock: Mutex<Clock>,
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u16) -> Self {
        assert!(
            (worker_id as u64) < (1 << WORKER_BITS),
            "worker_id must fit in {WORKER_BITS} bits"
        );
        Self {
            worker_id: worker_id as u64,
            clock: Mutex::new(Clock {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn generate(&self) -> i64 {
        let mut clock = self.clock.lock().unwrap();

        let mut now_ms = current_ms();
        if now_ms < clock.last_ms {
            panic!(
                "clock moved backwards: last_ms={}, now_ms={}",
                clock.last_ms, now_ms
            );
        }

        if now_ms == clock.last_ms {
            clock.sequence = (clock.sequence + 1) & SEQUENCE_MASK;
            if clock.sequence == 0 {
                // 4096 IDs minted this millisecond; wait out the rest of it.
                while now_ms == clock.last_ms {
                    now_ms = current_ms();
                }
            }
        } else {
            clock.sequence = 0;
        }

        clock.last_ms = now_ms;

        let ts = now_ms - RELAY_EPOCH_MS;
        ((ts << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | clock.sequence) as i64
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn no_duplicates_under_burst() {
        let gen = SnowflakeGenerator::new(3);
        let mut seen = HashSet::new();
        for _ in 0..20_000 {
            assert!(seen.insert(gen.generate()));
        }
    }

    #[test]
    fn strictly_increasing() {
        let gen = SnowflakeGenerator::new(0);
        let mut prev = i64::MIN;
        for _ in 0..2_000 {
            let id = gen.generate();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    #[should_panic(expected = "worker_id must fit")]
    fn rejects_oversized_worker_id() {
        SnowflakeGenerator::new(1024);
    }
}
