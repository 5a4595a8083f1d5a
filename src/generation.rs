use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::warn;
use std::time::Duration;

/// Produces text from a fully assembled prompt
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run the generator with a bounded wait
///
/// A wait longer than `timeout` becomes `RagError::GenerationTimeout`. A
/// generator that returns `GenerationTimeout` itself is handled the same way:
/// with `retry_on_timeout` the same prompt is tried once more.
/// Other generation errors are returned unchanged.
pub async fn generate_with_timeout(
    generator: &dyn Generator,
    prompt: &str,
    timeout: Duration,
    retry_on_timeout: bool,
) -> Result<String> {
    match generate_once(generator, prompt, timeout).await {
        Err(RagError::GenerationTimeout(elapsed)) if retry_on_timeout => {
            warn!("Generation timed out after {:?}, retrying once", elapsed);
            generate_once(generator, prompt, timeout).await
        }
        result => result,
    }
}

async fn generate_once(generator: &dyn Generator, prompt: &str, timeout: Duration) -> Result<String> {
    tokio::time::timeout(timeout, generator.generate(prompt))
        .await
        .map_err(|_| RagError::GenerationTimeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps on the first `slow_calls` calls, then answers immediately
    struct SlowGenerator {
        calls: AtomicUsize,
        slow_calls: usize,
    }

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.slow_calls {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(format!("echo: {}", prompt))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let generator = SlowGenerator {
            calls: AtomicUsize::new(0),
            slow_calls: 1,
        };
        let err = generate_with_timeout(&generator, "hi", Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationTimeout(d) if d == Duration::from_secs(5)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_after_timeout() {
        let generator = SlowGenerator {
            calls: AtomicUsize::new(0),
            slow_calls: 1,
        };
        let answer = generate_with_timeout(&generator, "hi", Duration::from_secs(5), true)
            .await
            .unwrap();
        assert_eq!(answer, "echo: hi");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    /// Reports its own timeout on the first call
    struct SelfTimingOutGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for SelfTimingOutGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RagError::GenerationTimeout(Duration::from_secs(1)));
            }
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn test_generator_reported_timeout_is_retried() {
        let generator = SelfTimingOutGenerator {
            calls: AtomicUsize::new(0),
        };
        let answer = generate_with_timeout(&generator, "hi", Duration::from_secs(5), true)
            .await
            .unwrap();
        assert_eq!(answer, "done");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

        let generator = SelfTimingOutGenerator {
            calls: AtomicUsize::new(0),
        };
        let err = generate_with_timeout(&generator, "hi", Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationTimeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_second_timeout() {
        let generator = SlowGenerator {
            calls: AtomicUsize::new(0),
            slow_calls: 5,
        };
        let err = generate_with_timeout(&generator, "hi", Duration::from_secs(5), true)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationTimeout(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
