use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_stream::Stream;

use typedstream_core::StreamRoute;

/// One tick of the clock stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub seq: u64,
    pub elapsed_ms: u64,
}

/// One word of a split sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub index: usize,
    pub text: String,
}

/// `GET /ticks?count=N`
pub const TICKS: StreamRoute<Tick> = StreamRoute::new("/ticks");

/// `GET /words?text=...`
pub const WORDS: StreamRoute<Word> = StreamRoute::new("/words");

/// Emit `count` ticks, `interval` apart. The first tick is immediate.
pub fn ticks(count: u64, interval: Duration) -> impl Stream<Item = Tick> + Send {
    async_stream::stream! {
        let start = Instant::now();
        for seq in 0..count {
            if seq > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            yield Tick { seq, elapsed_ms };
        }
    }
}

/// Split `text` on whitespace.
pub fn words(text: &str) -> Vec<Word> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, word)| Word {
            index,
            text: word.to_string(),
        })
        .collect()
}
