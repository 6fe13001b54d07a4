use rand::Rng;
use rand::distributions::Alphanumeric;

const SHORT_ID_LENGTH: usize = 12;

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    fn new_short_id(&self) -> String;
}

/// Random alphanumeric ids, 12 characters (about 71 bits) long.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortIdGenerator;

impl IdGenerator for ShortIdGenerator {
    fn new_short_id(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_ID_LENGTH)
            .map(char::from)
            .collect()
    }
}
