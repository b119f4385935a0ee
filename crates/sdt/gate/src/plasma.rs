//! Lock-free shared state record of one gate.
//!
//! The record is a ring of cache-aligned slots plus a single `head` word
//! that packs `(version, slot)`. A snapshot is never mutated in place:
//!
//! 1. A writer takes ownership of a slot that is not the published one.
//! 2. It fills the slot with the complete next snapshot, guarded by the
//!    slot's sequence word.
//! 3. It publishes the slot with one compare-and-swap on `head`, then gives
//!    up ownership. If another writer published first, the slot is simply
//!    abandoned.
//!
//! Readers follow `head`, copy the slot, and accept the copy only if the
//! slot's sequence did not move and `head` still names the same
//! publication. Versions only grow, so an unchanged `head` means the slot
//! stayed published, and a published slot is never refilled.
//!
//! No locks, no allocation and no `unsafe`: every word is an atomic. The
//! ring has room for `SLOT_COUNT - 1` writers filling slots at once; more
//! than that wait in `claim_slot` for a slot to free up.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, AtomicUsize, Ordering};

use sdt_types::{Entropy, GateState, PhaseAngle};
use serde::{Deserialize, Serialize};

/// Number of slots in the ring. One is always published, so at most
/// `SLOT_COUNT - 1` writers can fill a slot without waiting.
pub const SLOT_COUNT: usize = 16;

/// Payload words per slot.
const WORDS: usize = 7;

const INDEX_BITS: u32 = 8;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Full, consistent view of a gate's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlasmaSnapshot {
    pub phase_angle: PhaseAngle,
    pub entropy: Entropy,
    /// Whether the last applied decision allowed flow.
    pub excited: bool,
    /// Aggregate strength of the last applied evaluation.
    pub last_ring_strength: f64,
    /// Moving average of aggregate strength, read by adaptive crystals.
    pub resonance_average: f64,
    /// Applied ticks that allowed flow.
    pub trigger_count: u64,
    /// Calls rejected as stale.
    pub supersession_count: u64,
    pub gate_state: GateState,
    pub last_tick: u64,
    /// Consecutive applied ticks below the entropy floor.
    pub starvation_streak: u32,
}

impl Default for PlasmaSnapshot {
    fn default() -> Self {
        Self {
            phase_angle: PhaseAngle(0),
            entropy: Entropy(0),
            excited: false,
            last_ring_strength: 0.0,
            resonance_average: 0.0,
            trigger_count: 0,
            supersession_count: 0,
            gate_state: GateState::Off,
            last_tick: 0,
            starvation_streak: 0,
        }
    }
}

impl PlasmaSnapshot {
    fn encode(&self) -> [u64; WORDS] {
        let signals = u64::from(self.phase_angle.0)
            | u64::from(self.entropy.0) << 16
            | u64::from(self.gate_state.code()) << 32
            | u64::from(self.excited) << 40;
        [
            self.last_tick,
            self.trigger_count,
            self.supersession_count,
            self.last_ring_strength.to_bits(),
            self.resonance_average.to_bits(),
            signals,
            u64::from(self.starvation_streak),
        ]
    }

    fn decode(words: &[u64; WORDS]) -> Self {
        let signals = words[5];
        Self {
            last_tick: words[0],
            trigger_count: words[1],
            supersession_count: words[2],
            last_ring_strength: f64::from_bits(words[3]),
            resonance_average: f64::from_bits(words[4]),
            phase_angle: PhaseAngle(signals as u16),
            entropy: Entropy((signals >> 16) as u16),
            gate_state: GateState::from_code((signals >> 32) as u8),
            excited: (signals >> 40) & 1 == 1,
            starvation_streak: words[6] as u32,
        }
    }
}

/// A snapshot together with the publication it was read from.
///
/// Pass it back to [`PlasmaState::compare_and_swap`] to install a successor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observed {
    pub snapshot: PlasmaSnapshot,
    head: u64,
}

impl Observed {
    /// Publication counter. Increases by one with every installed snapshot.
    pub fn version(&self) -> u64 {
        self.head >> INDEX_BITS
    }
}

fn pack(version: u64, index: usize) -> u64 {
    version << INDEX_BITS | index as u64
}

fn unpack(head: u64) -> (u64, usize) {
    (head >> INDEX_BITS, (head & INDEX_MASK) as usize)
}

/// Pads a value to its own pair of cache lines.
#[derive(Debug, Default)]
#[repr(align(128))]
struct CacheAligned<T>(T);

/// One snapshot buffer.
#[derive(Debug, Default)]
#[repr(C, align(128))]
struct Slot {
    /// Held by a writer from claim until its publish attempt resolves.
    owned: AtomicBool,
    /// Even when stable, odd while the owner is filling the slot.
    seq: AtomicU64,
    words: [AtomicU64; WORDS],
}

impl Slot {
    fn try_claim(&self) -> bool {
        self.owned
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn disown(&self) {
        self.owned.store(false, Ordering::Release);
    }

    /// Only the owner may fill a slot.
    fn fill(&self, words: &[u64; WORDS]) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq + 1, Ordering::Relaxed);
        // Orders the odd sequence before the payload stores below.
        fence(Ordering::Release);
        for (slot, word) in self.words.iter().zip(words) {
            slot.store(*word, Ordering::Relaxed);
        }
        self.seq.store(seq + 2, Ordering::Release);
    }

    /// Copy the payload if no fill overlapped the copy.
    fn read(&self) -> Option<[u64; WORDS]> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let mut words = [0u64; WORDS];
        for (word, slot) in words.iter_mut().zip(&self.words) {
            *word = slot.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        (self.seq.load(Ordering::Relaxed) == before).then_some(words)
    }
}

/// The shared state record of one gate.
///
/// Every field of [`PlasmaSnapshot`] is replaced together; readers never
/// observe a mix of two transitions.
#[derive(Debug)]
pub struct PlasmaState {
    head: CacheAligned<AtomicU64>,
    cursor: CacheAligned<AtomicUsize>,
    slots: [Slot; SLOT_COUNT],
}

impl Default for PlasmaState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlasmaState {
    /// Record at rest: gate `Off`, all counters zero.
    pub fn new() -> Self {
        Self::with_snapshot(PlasmaSnapshot::default())
    }

    /// Record seeded with an initial snapshot.
    pub fn with_snapshot(initial: PlasmaSnapshot) -> Self {
        let slots: [Slot; SLOT_COUNT] = std::array::from_fn(|_| Slot::default());
        for (word, value) in slots[0].words.iter().zip(initial.encode()) {
            word.store(value, Ordering::Relaxed);
        }
        Self {
            head: CacheAligned(AtomicU64::new(pack(0, 0))),
            cursor: CacheAligned(AtomicUsize::new(1)),
            slots,
        }
    }

    /// Read the current snapshot in one consistent copy.
    pub fn load(&self) -> Observed {
        loop {
            let head = self.head.0.load(Ordering::Acquire);
            let (_, index) = unpack(head);
            if let Some(words) = self.slots[index].read() {
                // Head unchanged: the slot stayed published for the whole copy.
                if self.head.0.load(Ordering::Acquire) == head {
                    return Observed {
                        snapshot: PlasmaSnapshot::decode(&words),
                        head,
                    };
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Shorthand for `load().snapshot`.
    pub fn snapshot(&self) -> PlasmaSnapshot {
        self.load().snapshot
    }

    /// Install `next` only if nothing was published since `expected` was read.
    ///
    /// On success returns the installed observation. On conflict returns the
    /// current one so the caller can recompute and retry.
    pub fn compare_and_swap(
        &self,
        expected: &Observed,
        next: PlasmaSnapshot,
    ) -> Result<Observed, Observed> {
        if self.head.0.load(Ordering::Acquire) != expected.head {
            return Err(self.load());
        }

        let index = self.claim_slot();
        let slot = &self.slots[index];
        slot.fill(&next.encode());

        let head = pack(expected.version() + 1, index);
        let published =
            self.head
                .0
                .compare_exchange(expected.head, head, Ordering::AcqRel, Ordering::Acquire);
        slot.disown();

        match published {
            Ok(_) => Ok(Observed {
                snapshot: next,
                head,
            }),
            Err(_) => Err(self.load()),
        }
    }

    /// Install `next` only if the current `last_tick` is `expected_last_tick`.
    ///
    /// Stricter than comparing ticks alone: the swap also fails if any other
    /// snapshot (a supersession, a reset) was published in between.
    pub fn install_if_tick(
        &self,
        expected_last_tick: u64,
        next: PlasmaSnapshot,
    ) -> Result<Observed, Observed> {
        let current = self.load();
        if current.snapshot.last_tick != expected_last_tick {
            return Err(current);
        }
        self.compare_and_swap(&current, next)
    }

    /// Optimistic read-modify-write.
    ///
    /// `f` computes the successor of the current snapshot and is re-run on
    /// every conflict, so it must be free of side effects. Returning `None`
    /// aborts without publishing. On success returns `(previous, installed)`.
    pub fn update<F>(&self, mut f: F) -> Option<(PlasmaSnapshot, PlasmaSnapshot)>
    where
        F: FnMut(&PlasmaSnapshot) -> Option<PlasmaSnapshot>,
    {
        let mut observed = self.load();
        loop {
            let next = f(&observed.snapshot)?;
            match self.compare_and_swap(&observed, next) {
                Ok(installed) => return Some((observed.snapshot, installed.snapshot)),
                Err(current) => observed = current,
            }
        }
    }

    /// Claim a slot that is neither owned nor published.
    fn claim_slot(&self) -> usize {
        loop {
            let index = self.cursor.0.fetch_add(1, Ordering::Relaxed) % SLOT_COUNT;
            let slot = &self.slots[index];
            if !slot.try_claim() {
                std::hint::spin_loop();
                continue;
            }
            // Only the owner can publish a slot, so once owned this check is stable.
            if unpack(self.head.0.load(Ordering::Acquire)).1 == index {
                slot.disown();
                continue;
            }
            return index;
        }
    }
}
