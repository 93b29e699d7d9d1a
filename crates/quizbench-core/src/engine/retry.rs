use crate::errors::EvaluatorError;
use crate::providers::llm::{Evaluator, GenerateOptions};
use tokio::time::{sleep, Duration};

/// Invoke `generate` with bounded retry. Only `Transient`/`Protocol` errors
/// are retried; `Auth` is returned immediately. On success returns the text
/// and the number of attempts spent.
pub(crate) async fn generate_with_retry(
    client: &dyn Evaluator,
    prompt: &str,
    opts: &GenerateOptions,
    max_attempts: u32,
    backoff_base_ms: u64,
) -> Result<(String, u32), (EvaluatorError, u32)> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.generate(prompt, opts).await {
            Ok(text) => return Ok((text, attempt)),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let backoff = backoff_base_ms.saturating_mul(1 << (attempt - 1).min(6));
                tracing::warn!(
                    attempt,
                    max_attempts,
                    backoff_ms = backoff,
                    "evaluator call failed, retrying: {}",
                    e
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err((e, attempt)),
        }
    }
}
