use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};

pub(crate) fn dtmf_channel() -> (DtmfSender, DtmfCollector) {
    let (tx, rx) = mpsc::unbounded_channel();

    (
        DtmfSender(tx),
        DtmfCollector {
            inner: Arc::new(Inner {
                queue: Mutex::new(rx),
                started_typing: Notify::new(),
                typing: AtomicBool::new(false),
            }),
        },
    )
}

#[derive(Clone)]
pub(crate) struct DtmfSender(mpsc::UnboundedSender<char>);

impl DtmfSender {
    pub(crate) fn send(&self, key: char) {
        let _ = self.0.send(key);
    }
}

/// Buffers decoded DTMF keys for consumption by caller code.
///
/// Cheap to clone, all clones read from the same queue.
#[derive(Clone)]
pub struct DtmfCollector {
    inner: Arc<Inner>,
}

struct Inner {
    queue: Mutex<mpsc::UnboundedReceiver<char>>,
    started_typing: Notify,
    typing: AtomicBool,
}

impl DtmfCollector {
    async fn next_key(&self) -> Option<char> {
        let key = self.inner.queue.lock().await.recv().await?;

        if !self.inner.typing.swap(true, Ordering::SeqCst) {
            self.inner.started_typing.notify_one();
        }

        Some(key)
    }

    /// Collect the next `length` keys.
    ///
    /// Returns early with what was collected when the call's media session
    /// goes away.
    pub async fn get_dtmf(&self, length: usize) -> String {
        let mut keys = String::new();

        while keys.len() < length {
            match self.next_key().await {
                Some(key) => keys.push(key),
                None => break,
            }
        }

        self.inner.typing.store(false, Ordering::SeqCst);

        keys
    }

    /// Collect keys until `finish_key` is pressed. The finish key itself is
    /// not part of the result and does not terminate an empty input.
    pub async fn get_dtmf_until(&self, finish_key: char) -> String {
        let mut keys = String::new();

        loop {
            match self.next_key().await {
                Some(key) if key == finish_key && !keys.is_empty() => break,
                Some(key) if key == finish_key => {}
                Some(key) => keys.push(key),
                None => break,
            }
        }

        self.inner.typing.store(false, Ordering::SeqCst);

        keys
    }

    /// One-shot flag: resolves once the peer starts typing
    pub async fn started_typing(&self) {
        self.inner.started_typing.notified().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_dtmf_by_length() {
        let (tx, collector) = dtmf_channel();

        tx.send('1');
        tx.send('2');
        tx.send('3');

        assert_eq!(collector.get_dtmf(2).await, "12");
        assert_eq!(collector.get_dtmf(1).await, "3");
    }

    #[tokio::test]
    async fn get_dtmf_until_finish_key() {
        let (tx, collector) = dtmf_channel();

        for key in ['4', '2', '#', '9'] {
            tx.send(key);
        }

        assert_eq!(collector.get_dtmf_until('#').await, "42");
        assert_eq!(collector.get_dtmf(1).await, "9");
    }

    #[tokio::test]
    async fn finish_key_does_not_end_empty_input() {
        let (tx, collector) = dtmf_channel();

        for key in ['#', '7', '#'] {
            tx.send(key);
        }

        assert_eq!(collector.get_dtmf_until('#').await, "7");
    }

    #[tokio::test]
    async fn returns_collected_keys_when_sender_is_gone() {
        let (tx, collector) = dtmf_channel();

        tx.send('5');
        drop(tx);

        assert_eq!(collector.get_dtmf(4).await, "5");
    }

    #[tokio::test]
    async fn started_typing_fires_on_first_key() {
        let (tx, collector) = dtmf_channel();

        let waiter = {
            let collector = collector.clone();
            tokio::spawn(async move {
                tokio::time::timeout(Duration::from_secs(1), collector.started_typing())
                    .await
                    .is_ok()
            })
        };

        tokio::task::yield_now().await;
        tx.send('1');
        collector.get_dtmf(1).await;

        assert!(waiter.await.unwrap());
    }
}
