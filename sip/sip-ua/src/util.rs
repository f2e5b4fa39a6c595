use bytesstr::BytesStr;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};

/// Strictly increasing CSeq counter
#[derive(Debug)]
pub struct Counter(u32);

impl Counter {
    pub fn new(start: u32) -> Self {
        Self(start)
    }

    /// A counter starting at a random small value, so sequence numbers do
    /// not leak how many calls this process made
    pub fn random() -> Self {
        Self(rng().random_range(1..2000))
    }

    pub fn current(&self) -> u32 {
        self.0
    }

    pub fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

fn random_token(len: usize) -> BytesStr {
    rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .into()
}

/// Random tag for From/To headers
pub fn generate_tag() -> BytesStr {
    random_token(16)
}

/// Random Call-ID
pub fn generate_call_id() -> BytesStr {
    random_token(32)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_is_strictly_increasing() {
        let mut counter = Counter::new(41);

        assert_eq!(counter.next(), 42);
        assert_eq!(counter.next(), 43);
        assert_eq!(counter.current(), 43);
    }

    #[test]
    fn tags_are_unique() {
        assert_ne!(generate_tag(), generate_tag());
        assert_ne!(generate_call_id(), generate_call_id());
    }
}
