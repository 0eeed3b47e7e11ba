//! The machine state and its fixed size snapshot encoding.
//!
//! A snapshot is 190 bytes, all integers big endian:
//!
//! | field       | bytes |
//! |-------------|-------|
//! | memory root | 32    |
//! | pc          | 4     |
//! | next pc     | 4     |
//! | lo          | 4     |
//! | hi          | 4     |
//! | heap        | 4     |
//! | exit code   | 1     |
//! | exited      | 1     |
//! | step        | 8     |
//! | registers   | 32 * 4|
//!
//! The digest of a state is the keccak of its snapshot, and the snapshot is
//! kept in the preimage store under that digest so any state can be
//! recovered from its digest alone.

use dispute_common::{keccak, EMPTY_TRIE_HASH};
use ethereum_types::H256;
use preimage_trie::PreimageStore;

use crate::error::{StepError, StepResult};

/// Length of an encoded [`State`].
pub const STATE_LEN: usize = 190;

/// Where `mmap` with a null hint starts handing out memory.
pub const HEAP_START: u32 = 0x2000_0000;

/// The full MIPS machine state at one step of a trace.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct State {
    /// Root of the memory trie.
    pub memory_root: H256,
    /// Address of the instruction executed next.
    pub pc: u32,
    /// Address of the instruction executed after `pc`. Differs from
    /// `pc + 4` while `pc` is a delay slot.
    pub next_pc: u32,
    /// Low word of multiplication and division results.
    pub lo: u32,
    /// High word of multiplication and division results.
    pub hi: u32,
    /// Next address handed out by `mmap`.
    pub heap: u32,
    /// Exit code passed to `exit_group`.
    pub exit_code: u8,
    /// Whether the program called `exit_group`.
    pub exited: bool,
    /// Number of instructions executed so far.
    pub step: u64,
    /// General purpose registers. `registers[0]` is always zero.
    pub registers: [u32; 32],
}

impl Default for State {
    fn default() -> Self {
        Self::golden(EMPTY_TRIE_HASH)
    }
}

impl State {
    /// The state before the first instruction of a program whose memory is
    /// the trie at `memory_root`.
    pub fn golden(memory_root: H256) -> Self {
        Self {
            memory_root,
            pc: 0,
            next_pc: 4,
            lo: 0,
            hi: 0,
            heap: HEAP_START,
            exit_code: 0,
            exited: false,
            step: 0,
            registers: [0; 32],
        }
    }

    /// Encodes the state into its snapshot form.
    pub fn encode(&self) -> [u8; STATE_LEN] {
        let mut out = [0; STATE_LEN];
        let mut w = Writer::new(&mut out);

        w.put(self.memory_root.as_bytes());
        for v in [self.pc, self.next_pc, self.lo, self.hi, self.heap] {
            w.put(&v.to_be_bytes());
        }
        w.put(&[self.exit_code, self.exited as u8]);
        w.put(&self.step.to_be_bytes());
        for r in self.registers {
            w.put(&r.to_be_bytes());
        }

        out
    }

    /// Decodes a snapshot. Returns `None` if `bytes` is not a valid one.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; STATE_LEN] = bytes.try_into().ok()?;
        let word = |at: usize| {
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        let exited = match bytes[53] {
            0 => false,
            1 => true,
            _ => return None,
        };
        let mut step = [0; 8];
        step.copy_from_slice(&bytes[54..62]);

        Some(Self {
            memory_root: H256::from_slice(&bytes[0..32]),
            pc: word(32),
            next_pc: word(36),
            lo: word(40),
            hi: word(44),
            heap: word(48),
            exit_code: bytes[52],
            exited,
            step: u64::from_be_bytes(step),
            registers: std::array::from_fn(|i| word(62 + 4 * i)),
        })
    }

    /// The digest identifying this state.
    pub fn digest(&self) -> H256 {
        keccak(self.encode())
    }

    /// Puts the snapshot into `store` and returns its digest.
    pub fn store(&self, store: &mut PreimageStore) -> StepResult<H256> {
        Ok(store.add(self.encode().to_vec())?)
    }

    /// Recovers the state with the given digest from `store`.
    ///
    /// Fails with [`StepError::MissingNode`] if the snapshot is not known.
    pub fn load(store: &PreimageStore, digest: H256) -> StepResult<Self> {
        let bytes = store.get(&digest).map_err(|_| StepError::MissingNode(digest))?;

        Self::decode(&bytes).ok_or(StepError::MalformedState {
            digest,
            len: bytes.len(),
        })
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, at: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.at..self.at + bytes.len()].copy_from_slice(bytes);
        self.at += bytes.len();
    }
}

#[cfg(test)]
mod tests {
    use dispute_common::keccak;
    use ethereum_types::H256;
    use preimage_trie::PreimageStore;

    use super::{State, STATE_LEN};
    use crate::error::StepError;

    fn sample() -> State {
        let mut s = State::golden(H256::repeat_byte(0x11));
        s.pc = 0x1234;
        s.next_pc = 0x4000;
        s.lo = 7;
        s.hi = 9;
        s.exit_code = 3;
        s.exited = true;
        s.step = 0x0102_0304_0506_0708;
        s.registers[31] = 0xdead_beef;

        s
    }

    #[test]
    fn layout_matches_the_documented_offsets() {
        let enc = sample().encode();

        assert_eq!(&enc[0..32], &[0x11; 32]);
        assert_eq!(&enc[32..36], &[0, 0, 0x12, 0x34]);
        assert_eq!(&enc[48..52], &[0x20, 0, 0, 0]);
        assert_eq!(enc[52], 3);
        assert_eq!(enc[53], 1);
        assert_eq!(&enc[54..62], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&enc[STATE_LEN - 4..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn decode_inverts_encode() {
        let s = sample();
        assert_eq!(State::decode(&s.encode()), Some(s));
    }

    #[test]
    fn decode_rejects_bad_snapshots() {
        let mut enc = sample().encode();
        assert_eq!(State::decode(&enc[..STATE_LEN - 1]), None);

        enc[53] = 2;
        assert_eq!(State::decode(&enc), None);
    }

    #[test]
    fn load_needs_the_snapshot_preimage() {
        let s = sample();
        let mut store = PreimageStore::new();
        assert_eq!(
            State::load(&store, s.digest()),
            Err(StepError::MissingNode(s.digest()))
        );

        let d = s.store(&mut store).unwrap();
        assert_eq!(d, keccak(s.encode()));
        assert_eq!(State::load(&store, d).unwrap(), s);
    }

    #[test]
    fn any_field_change_changes_the_digest() {
        let s = sample();
        let mut t = s.clone();
        t.registers[2] ^= 1;
        assert_ne!(s.digest(), t.digest());
    }
}
