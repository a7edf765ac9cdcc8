use rand::SeedableRng;
use rand::rngs::StdRng;
use crate::rng::SyncRng;

pub fn make_test_rng() -> SyncRng<StdRng> {
    SyncRng::new(StdRng::seed_from_u64(42))
}
