#[cfg(test)] pub mod testing;

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use rand::{CryptoRng, Rng};
use uuid::{Uuid, Variant, Version};

pub struct SyncRng<R: CryptoRng + Send + Sync> {
    rng: Arc<Mutex<R>>,
}

impl<R: CryptoRng + Send + Sync> SyncRng<R> {
    pub fn new(rng: R) -> Self {
        SyncRng {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn get_rng(&self) -> MutexGuard<'_, R> {
        self.rng.lock().unwrap()
    }
}

impl<R: CryptoRng + Send + Sync> Deref for SyncRng<R> {
    type Target = Arc<Mutex<R>>;

    fn deref(&self) -> &Self::Target {
        &self.rng
    }
}

impl<R: CryptoRng + Send + Sync> Clone for SyncRng<R> {
    fn clone(&self) -> Self {
        SyncRng {
            rng: self.rng.clone(),
        }
    }
}

pub fn make_uuid<R: Rng>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.random())
        .with_variant(Variant::RFC4122)
        .with_version(Version::Random)
        .into_uuid()
}
