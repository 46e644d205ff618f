use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Where the simulation seed for a run came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedChoice {
    Flag(u64),
    Generated(u64),
}

impl SeedChoice {
    pub fn resolve(flag: Option<u64>) -> Self {
        match flag {
            Some(seed) => Self::Flag(seed),
            None => Self::Generated(generate_runtime_seed()),
        }
    }

    pub fn value(self) -> u64 {
        match self {
            Self::Flag(seed) | Self::Generated(seed) => seed,
        }
    }
}

static GENERATED_SEED_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate_runtime_seed() -> u64 {
    let now_nanos =
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0_u128, |elapsed| elapsed.as_nanos());
    let counter = GENERATED_SEED_COUNTER.fetch_add(1, Ordering::Relaxed);
    let entropy = (now_nanos as u64)
        ^ u64::from(process::id()).rotate_left(17)
        ^ counter.rotate_left(7);
    splitmix(entropy)
}

fn splitmix(mut value: u64) -> u64 {
    value ^= value >> 30;
    value = value.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    value ^= value >> 27;
    value = value.wrapping_mul(0x94D0_49BB_1331_11EB);
    value ^ (value >> 31)
}
